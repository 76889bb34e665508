//! Static reference data for Zimbabwean addresses.
//!
//! Everything here is read-only. Rule tables are ordered: earlier entries are
//! applied first, so longer spellings come before their shorter prefixes.

use crate::normalize::SubstitutionRule;

pub const KNOWN_CITIES: &[&str] = &[
    "Harare",
    "Bulawayo",
    "Chitungwiza",
    "Mutare",
    "Gweru",
    "Kwekwe",
    "Kadoma",
    "Masvingo",
    "Chinhoyi",
    "Marondera",
    "Norton",
    "Chegutu",
    "Bindura",
    "Beitbridge",
    "Redcliff",
    "Victoria Falls",
    "Hwange",
    "Chiredzi",
    "Kariba",
    "Karoi",
    "Chipinge",
    "Zvishavane",
    "Rusape",
    "Shurugwi",
    "Gokwe",
    "Plumtree",
    "Gwanda",
    "Lupane",
    "Murewa",
    "Ruwa",
    "Epworth",
    "Borrowdale",
    "Avondale",
    "Hatfield",
    "Highlands",
    "Mbare",
    "Highfield",
    "Glen Norah",
    "Budiriro",
    "Warren Park",
    "Mufakose",
    "Dzivarasekwa",
    "Kambuzuma",
    "Kuwadzana",
    "Marlborough",
    "Mount Pleasant",
    "Greendale",
    "Eastlea",
    "Arcadia",
    "Belvedere",
    "Milton Park",
    "Alexandra Park",
    "Newlands",
    "Hillside",
    "Burnside",
    "Matsheumhlope",
    "Nkulumane",
    "Pumula",
    "Nketa",
    "Cowdray Park",
    "Luveve",
    "Entumbane",
    "Magwegwe",
    "Lobengula",
    "Emakhandeni",
    "Tshabalala",
    "Njube",
    "Mpopoma",
    "Makokoba",
    "Barbourfields",
    "Filabusi",
    "Glendale",
    "Concession",
    "Shamva",
    "Mazowe",
    "Domboshava",
    "Hatcliffe",
    "Borrowdale Brooke",
    "Glen Lorne",
    "Chisipite",
    "Greystone Park",
];

/// Known streets keyed by the misspellings and abbreviations seen in the
/// registry.
pub const STREET_CORRECTIONS: &[SubstitutionRule] = &[
    SubstitutionRule::new("n. mandela", "Nelson Mandela"),
    SubstitutionRule::new("n.mandela", "Nelson Mandela"),
    SubstitutionRule::new("n mandela", "Nelson Mandela"),
    SubstitutionRule::new("nmandela", "Nelson Mandela"),
    SubstitutionRule::new("r. mugabe", "Robert Mugabe"),
    SubstitutionRule::new("r.mugabe", "Robert Mugabe"),
    SubstitutionRule::new("r mugabe", "Robert Mugabe"),
    SubstitutionRule::new("rmugabe", "Robert Mugabe"),
    SubstitutionRule::new("s machel", "Samora Machel"),
    SubstitutionRule::new("j tongogara", "Josiah Tongogara"),
    SubstitutionRule::new("h chitepo", "Herbert Chitepo"),
    SubstitutionRule::new("j moyo", "Jason Moyo"),
    SubstitutionRule::new("l takawira", "Leopold Takawira"),
    SubstitutionRule::new("fife ave", "Fife Avenue"),
    SubstitutionRule::new("borrowdale rd", "Borrowdale Road"),
    SubstitutionRule::new("enterprise rd", "Enterprise Road"),
    SubstitutionRule::new("chiremba rd", "Chiremba Road"),
];

/// Whole-token abbreviation expansions applied during normalization.
pub const ABBREVIATIONS: &[SubstitutionRule] = &[
    SubstitutionRule::new("st", "Street"),
    SubstitutionRule::new("rd", "Road"),
    SubstitutionRule::new("ave", "Avenue"),
    SubstitutionRule::new("cnr", "Corner"),
    SubstitutionRule::new("&", "and"),
    SubstitutionRule::new("blvd", "Boulevard"),
    SubstitutionRule::new("dr", "Drive"),
    SubstitutionRule::new("cres", "Crescent"),
    SubstitutionRule::new("ct", "Court"),
    SubstitutionRule::new("ext", "Extension"),
];

/// Approximate city centres, used only by the opt-in centroid fallback.
pub const CITY_CENTROIDS: &[(&str, f64, f64)] = &[
    ("Harare", -17.8252, 31.0335),
    ("Bulawayo", -20.1325, 28.6265),
    ("Gweru", -19.4500, 29.8167),
    ("Mutare", -18.9758, 32.6504),
    ("Masvingo", -20.0744, 30.8328),
    ("Chitungwiza", -18.0127, 31.0756),
    ("Kwekwe", -18.9281, 29.8149),
    ("Kadoma", -18.3333, 29.9167),
    ("Bindura", -17.3019, 31.3306),
    ("Marondera", -18.1853, 31.5519),
];
