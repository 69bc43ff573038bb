//! Language catalog
//!
//! A fixed, process-wide table of the languages the translation backends know
//! about. Each [`Lang`] carries its code (`en`, `zh-CN`, ...), its English
//! name (used in prompts and pickers) and its name in the language itself.
//!
//! The code also decides which Android `values-*` directory a translation is
//! written to; see [`Lang::values_directory_name`].

use std::fmt;

/// A single language known to the tool
///
/// Values are immutable and `'static`; equality and hashing consider all
/// fields, but codes are unique within [`Languages::all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lang {
    /// Language code, optionally with a region subtag (`pt-BR`)
    pub code: &'static str,
    /// English display name
    pub english_name: &'static str,
    /// Display name in the language itself
    pub local_name: &'static str,
}

impl Lang {
    pub const fn new(
        code: &'static str,
        english_name: &'static str,
        local_name: &'static str,
    ) -> Self {
        Self {
            code,
            english_name,
            local_name,
        }
    }

    /// The primary language subtag: `pt-BR` → `pt`
    pub fn primary(&self) -> &'static str {
        self.code.split('-').next().unwrap_or(self.code)
    }

    /// The region subtag, if the code has one: `pt-BR` → `Some("BR")`
    pub fn region(&self) -> Option<&'static str> {
        self.code.split('-').nth(1)
    }

    /// Whether this is the "detect the source language" pseudo-language
    pub fn is_auto(&self) -> bool {
        self.code == Languages::AUTO.code
    }

    /// Name of the Android resource directory holding this language's values
    ///
    /// # Example
    ///
    /// ```ignore
    /// assert_eq!(Languages::find("pt-BR").unwrap().values_directory_name(), "values-pt-rBR");
    /// assert_eq!(Languages::find("fr").unwrap().values_directory_name(), "values-fr");
    /// ```
    pub fn values_directory_name(&self) -> String {
        match self.region() {
            Some(region) => format!(
                "values-{}-r{}",
                self.primary(),
                region.to_ascii_uppercase()
            ),
            None => format!("values-{}", self.code),
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.english_name, self.code)
    }
}

/// The static language registry
pub struct Languages;

impl Languages {
    /// Source-language placeholder asking the backend to detect the language
    pub const AUTO: Lang = Lang::new("auto", "Auto", "Auto");

    /// Default source language of Android projects
    pub const ENGLISH: Lang = Lang::new("en", "English", "English");

    /// Every translatable language, in table order
    pub fn all() -> &'static [Lang] {
        LANGUAGES
    }

    /// Look up a language by code
    ///
    /// Matching ignores ASCII case so `zh-cn` finds `zh-CN`. `auto` resolves
    /// to [`Languages::AUTO`].
    pub fn find(code: &str) -> Option<Lang> {
        if code.eq_ignore_ascii_case(Self::AUTO.code) {
            return Some(Self::AUTO);
        }
        LANGUAGES
            .iter()
            .find(|lang| lang.code.eq_ignore_ascii_case(code))
            .copied()
    }
}

static LANGUAGES: &[Lang] = &[
    Lang::new("sq", "Albanian", "Shqip"),
    Lang::new("ar", "Arabic", "العربية"),
    Lang::new("am", "Amharic", "አማርኛ"),
    Lang::new("az", "Azerbaijani", "Azərbaycan"),
    Lang::new("ga", "Irish", "Gaeilge"),
    Lang::new("et", "Estonian", "Eesti"),
    Lang::new("eu", "Basque", "Euskara"),
    Lang::new("be", "Belarusian", "Беларуская"),
    Lang::new("bg", "Bulgarian", "Български"),
    Lang::new("is", "Icelandic", "Íslenska"),
    Lang::new("pl", "Polish", "Polski"),
    Lang::new("bs", "Bosnian", "Bosanski"),
    Lang::new("fa", "Persian", "فارسی"),
    Lang::new("af", "Afrikaans", "Afrikaans"),
    Lang::new("da", "Danish", "Dansk"),
    Lang::new("de", "German", "Deutsch"),
    Lang::new("ru", "Russian", "Русский"),
    Lang::new("fr", "French", "Français"),
    Lang::new("tl", "Filipino", "Filipino"),
    Lang::new("fi", "Finnish", "Suomi"),
    Lang::new("km", "Khmer", "ខ្មែរ"),
    Lang::new("ka", "Georgian", "ქართული"),
    Lang::new("gu", "Gujarati", "ગુજરાતી"),
    Lang::new("kk", "Kazakh", "Қазақ"),
    Lang::new("ko", "Korean", "한국어"),
    Lang::new("nl", "Dutch", "Nederlands"),
    Lang::new("ky", "Kyrgyz", "Кыргызча"),
    Lang::new("gl", "Galician", "Galego"),
    Lang::new("ca", "Catalan", "Català"),
    Lang::new("cs", "Czech", "Čeština"),
    Lang::new("kn", "Kannada", "ಕನ್ನಡ"),
    Lang::new("hr", "Croatian", "Hrvatski"),
    Lang::new("lv", "Latvian", "Latviešu"),
    Lang::new("lo", "Lao", "ລາວ"),
    Lang::new("lt", "Lithuanian", "Lietuvių"),
    Lang::new("ro", "Romanian", "Română"),
    Lang::new("mt", "Maltese", "Malti"),
    Lang::new("mr", "Marathi", "मराठी"),
    Lang::new("ml", "Malayalam", "മലയാളം"),
    Lang::new("ms", "Malay", "Bahasa Melayu"),
    Lang::new("mk", "Macedonian", "Македонски"),
    Lang::new("mn", "Mongolian", "Монгол"),
    Lang::new("bn", "Bengali", "বাংলা"),
    Lang::new("my", "Burmese", "မြန်မာ"),
    Lang::new("ne", "Nepali", "नेपाली"),
    Lang::new("nb", "Norwegian", "Norsk bokmål"),
    Lang::new("pa", "Punjabi", "ਪੰਜਾਬੀ"),
    Lang::new("pt", "Portuguese", "Português"),
    Lang::new("pt-BR", "Portuguese (Brazil)", "Português (Brasil)"),
    Lang::new("ja", "Japanese", "日本語"),
    Lang::new("sv", "Swedish", "Svenska"),
    Lang::new("sr", "Serbian", "Српски"),
    Lang::new("si", "Sinhala", "සිංහල"),
    Lang::new("sk", "Slovak", "Slovenčina"),
    Lang::new("sl", "Slovenian", "Slovenščina"),
    Lang::new("sw", "Swahili", "Kiswahili"),
    Lang::new("te", "Telugu", "తెలుగు"),
    Lang::new("ta", "Tamil", "தமிழ்"),
    Lang::new("th", "Thai", "ไทย"),
    Lang::new("tr", "Turkish", "Türkçe"),
    Lang::new("uk", "Ukrainian", "Українська"),
    Lang::new("ur", "Urdu", "اردو"),
    Lang::new("uz", "Uzbek", "Oʻzbek"),
    Lang::new("es", "Spanish", "Español"),
    Lang::new("el", "Greek", "Ελληνικά"),
    Lang::new("hu", "Hungarian", "Magyar"),
    Lang::new("hy", "Armenian", "Հայերեն"),
    Lang::new("it", "Italian", "Italiano"),
    Lang::new("iw", "Hebrew", "עברית"),
    Lang::new("hi", "Hindi", "हिन्दी"),
    Lang::new("in", "Indonesian", "Bahasa Indonesia"),
    Lang::new("en", "English", "English"),
    Lang::new("vi", "Vietnamese", "Tiếng Việt"),
    Lang::new("zh-CN", "Chinese Simplified", "简体中文"),
    Lang::new("zh-TW", "Chinese Traditional", "繁體中文"),
];
