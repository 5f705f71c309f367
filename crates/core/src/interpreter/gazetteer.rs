//! Static name lists the interpreter matches free text against.
//!
//! ASCII entries are compared against whole lowercase tokens. Entries in Indic
//! scripts are matched as substrings of a token, which tolerates attached
//! suffixes and the common nasalisation spelling variants.

use crate::domain::query::{Crop, Topic};

pub(crate) const CROP_NAMES: &[(Crop, &[&str])] = &[
    (Crop::Rice, &["rice", "paddy", "dhan", "dhaan", "chawal", "धान", "चावल"]),
    (Crop::Wheat, &["wheat", "gehun", "gehu", "gahu", "गेहूं", "गेहूँ", "गेहु"]),
    (Crop::Cotton, &["cotton", "kapas", "कपास"]),
    (Crop::Sugarcane, &["sugarcane", "sugar cane", "ganna", "गन्ना"]),
    (Crop::Tomato, &["tomato", "tomatoes", "tamatar", "टमाटर"]),
    (Crop::Onion, &["onion", "onions", "pyaz", "pyaaz", "kanda", "प्याज"]),
];

pub(crate) struct StateEntry {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

pub(crate) struct CityEntry {
    pub name: &'static str,
    pub state: &'static str,
    pub aliases: &'static [&'static str],
}

pub(crate) const STATES: &[StateEntry] = &[
    StateEntry { name: "Punjab", aliases: &["punjab", "पंजाब"] },
    StateEntry { name: "Haryana", aliases: &["haryana", "हरियाणा"] },
    StateEntry { name: "Uttar Pradesh", aliases: &["uttar pradesh", "उत्तर प्रदेश"] },
    StateEntry { name: "West Bengal", aliases: &["west bengal", "bengal", "पश्चिम बंगाल"] },
    StateEntry { name: "Bihar", aliases: &["bihar", "बिहार"] },
    StateEntry { name: "Gujarat", aliases: &["gujarat", "गुजरात"] },
    StateEntry { name: "Maharashtra", aliases: &["maharashtra", "महाराष्ट्र"] },
    StateEntry { name: "Karnataka", aliases: &["karnataka", "कर्नाटक"] },
    StateEntry { name: "Tamil Nadu", aliases: &["tamil nadu", "tamilnadu", "तमिलनाडु"] },
    StateEntry { name: "Andhra Pradesh", aliases: &["andhra pradesh", "andhra", "आंध्र प्रदेश"] },
    StateEntry { name: "Telangana", aliases: &["telangana", "तेलंगाना"] },
    StateEntry { name: "Madhya Pradesh", aliases: &["madhya pradesh", "मध्य प्रदेश"] },
    StateEntry { name: "Rajasthan", aliases: &["rajasthan", "राजस्थान"] },
];

pub(crate) const CITIES: &[CityEntry] = &[
    CityEntry { name: "Delhi", state: "Delhi", aliases: &["delhi", "new delhi", "दिल्ली"] },
    CityEntry { name: "Mumbai", state: "Maharashtra", aliases: &["mumbai", "bombay", "मुंबई"] },
    CityEntry { name: "Pune", state: "Maharashtra", aliases: &["pune", "पुणे"] },
    CityEntry { name: "Nashik", state: "Maharashtra", aliases: &["nashik", "nasik", "नासिक"] },
    CityEntry { name: "Nagpur", state: "Maharashtra", aliases: &["nagpur", "नागपुर"] },
    CityEntry {
        name: "Bengaluru",
        state: "Karnataka",
        aliases: &["bengaluru", "bangalore", "बेंगलुरु"],
    },
    CityEntry { name: "Chennai", state: "Tamil Nadu", aliases: &["chennai", "madras", "चेन्नई"] },
    CityEntry { name: "Coimbatore", state: "Tamil Nadu", aliases: &["coimbatore"] },
    CityEntry {
        name: "Kolkata",
        state: "West Bengal",
        aliases: &["kolkata", "calcutta", "कोलकाता"],
    },
    CityEntry { name: "Hyderabad", state: "Telangana", aliases: &["hyderabad", "हैदराबाद"] },
    CityEntry { name: "Ahmedabad", state: "Gujarat", aliases: &["ahmedabad", "अहमदाबाद"] },
    CityEntry { name: "Lucknow", state: "Uttar Pradesh", aliases: &["lucknow", "लखनऊ"] },
    CityEntry { name: "Patna", state: "Bihar", aliases: &["patna", "पटना"] },
    CityEntry { name: "Ludhiana", state: "Punjab", aliases: &["ludhiana", "लुधियाना"] },
    CityEntry { name: "Amritsar", state: "Punjab", aliases: &["amritsar", "अमृतसर"] },
    CityEntry { name: "Chandigarh", state: "Punjab", aliases: &["chandigarh", "चंडीगढ़"] },
    CityEntry { name: "Karnal", state: "Haryana", aliases: &["karnal", "करनाल"] },
    CityEntry { name: "Jaipur", state: "Rajasthan", aliases: &["jaipur", "जयपुर"] },
    CityEntry { name: "Bhopal", state: "Madhya Pradesh", aliases: &["bhopal", "भोपाल"] },
    CityEntry { name: "Indore", state: "Madhya Pradesh", aliases: &["indore", "इंदौर"] },
];

/// ASCII entries are prefix stems ("irrigat" covers irrigate and irrigation).
pub(crate) const TOPIC_KEYWORDS: &[(Topic, &[&str])] = &[
    (
        Topic::Market,
        &[
            "price", "rate", "mandi", "bhav", "bhaav", "daam", "market", "sell", "profit",
            "income", "भाव", "दाम", "मंडी", "कीमत", "बाजार", "बाज़ार", "मुनाफा",
        ],
    ),
    (
        Topic::Weather,
        &[
            "weather", "rain", "mausam", "barish", "baarish", "forecast", "temperature", "irrigat",
            "sinchai", "humid", "मौसम", "बारिश", "वर्षा", "तापमान", "सिंचाई",
        ],
    ),
    (
        Topic::Disease,
        &[
            "disease", "pest", "rog", "keeda", "keede", "blight", "blast", "fungus", "infect",
            "spots", "yellowing", "रोग", "कीट", "बीमारी", "कीड़",
        ],
    ),
    (
        Topic::Calendar,
        &[
            "sow", "plant", "harvest", "buwai", "buai", "katai", "calendar", "season", "बुवाई",
            "बुआई", "बोवाई", "कटाई", "बोना",
        ],
    ),
];

pub(crate) const ACRE_UNITS: &[&str] = &["acre", "acres", "ekad", "ekar", "एकड़", "एकड"];
pub(crate) const HECTARE_UNITS: &[&str] =
    &["hectare", "hectares", "hectre", "ha", "हेक्टेयर", "हेक्टर"];
pub(crate) const ACRES_PER_HECTARE: f64 = 2.47105;

/// Romanized Hindi function words and farming vocabulary.
pub(crate) const HINGLISH_MARKERS: &[&str] = &[
    "kya", "hai", "hain", "mera", "meri", "mere", "mein", "ka", "ki", "ke", "ko", "kaise",
    "kab", "kitna", "kitni", "kitne", "batao", "bataiye", "chahiye", "aaj", "kal", "nahi",
    "aur", "fasal", "kheti", "khet", "kisan", "bhav", "bhaav", "mausam", "barish", "daam",
    "keeda", "rog", "buwai", "katai", "sinchai", "gehun", "dhan", "ganna", "kapas", "tamatar",
    "pyaz",
];

pub(crate) const ENGLISH_WORDS: &[&str] = &[
    "the", "is", "are", "what", "how", "when", "which", "where", "my", "in", "of", "for", "to",
    "a", "an", "and", "will", "should", "can", "i", "me", "we", "it", "this", "today",
    "tomorrow", "week", "crop", "crops", "field", "farm", "leaves", "leaf", "help", "please",
    "about", "with", "on", "at", "there", "do", "does", "be", "now", "next",
];

/// Matches one gazetteer word against one lowercase token.
pub(crate) fn word_matches(token: &str, word: &str) -> bool {
    if word.is_ascii() {
        token == word
    } else {
        token.contains(word)
    }
}

/// Matches a topic stem against one lowercase token.
pub(crate) fn stem_matches(token: &str, stem: &str) -> bool {
    if stem.is_ascii() {
        token.starts_with(stem)
    } else {
        token.contains(stem)
    }
}

/// Positions of every occurrence of a possibly multi-word alias in `tokens`.
pub(crate) fn alias_positions(tokens: &[String], alias: &str) -> Vec<usize> {
    let words: Vec<&str> = alias.split(' ').collect();
    if words.is_empty() || tokens.len() < words.len() {
        return Vec::new();
    }

    tokens
        .windows(words.len())
        .enumerate()
        .filter(|(_, window)| {
            window.iter().zip(&words).all(|(token, word)| word_matches(token, word))
        })
        .map(|(position, _)| position)
        .collect()
}
