//! Fixed game-roster data used to validate intake answers: the class list,
//! the specs each class can queue as, and the shorthand players actually
//! type for both. Pure data and lookups, no IO.

/// Canonical class names with their spec lists.
const CLASS_SPECS: &[(&str, &[&str])] = &[
    ("Death Knight", &["Blood", "Frost", "Unholy"]),
    ("Demon Hunter", &["Havoc", "Vengeance"]),
    ("Druid", &["Balance", "Feral", "Guardian", "Restoration"]),
    ("Hunter", &["Beast Mastery", "Marksman", "Survival"]),
    ("Mage", &["Arcane", "Fire", "Frost"]),
    ("Monk", &["Brewmaster", "Mistweaver", "Windwalker"]),
    ("Paladin", &["Holy", "Protection", "Retribution"]),
    ("Priest", &["Discipline", "Holy", "Shadow"]),
    ("Rogue", &["Assassination", "Outlaw", "Subtlety"]),
    ("Shaman", &["Elemental", "Enhancement", "Restoration"]),
    ("Warlock", &["Affliction", "Demonology", "Destruction"]),
    ("Warrior", &["Arms", "Fury", "Protection"]),
];

/// Shorthand class names players type.
const CLASS_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Dk", "Death Knight"),
    ("Dh", "Demon Hunter"),
    ("Pala", "Paladin"),
    ("Lock", "Warlock"),
    ("War", "Warrior"),
];

/// Shorthand spec names, scoped by class since several collide ("Bm" is
/// Beast Mastery on a hunter but Brewmaster on a monk).
const SPEC_ABBREVIATIONS: &[(&str, &[(&str, &str)])] = &[
    ("Death Knight", &[("Uh", "Unholy")]),
    ("Druid", &[("Boomie", "Balance"), ("Resto", "Restoration")]),
    ("Hunter", &[("Bm", "Beast Mastery"), ("Mm", "Marksman")]),
    (
        "Monk",
        &[("Bm", "Brewmaster"), ("Mw", "Mistweaver"), ("Ww", "Windwalker")],
    ),
    ("Paladin", &[("Prot", "Protection"), ("Ret", "Retribution")]),
    ("Priest", &[("Disc", "Discipline")]),
    ("Rogue", &[("Assa", "Assassination"), ("Sub", "Subtlety")]),
    (
        "Shaman",
        &[("Ele", "Elemental"), ("Enhance", "Enhancement"), ("Resto", "Restoration")],
    ),
    (
        "Warlock",
        &[("Affli", "Affliction"), ("Demo", "Demonology"), ("Desto", "Destruction")],
    ),
    ("Warrior", &[("Prot", "Protection")]),
];

/// Common realm shorthand.
const REALM_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Tn", "Twisting Nether"),
    ("Tm", "Tarren Mill"),
    ("Voljin", "Vol'jin"),
    ("Vol Jin", "Vol'jin"),
];

/// Title-case every whitespace-separated word ("beast mastery" ->
/// "Beast Mastery"), which is the canonical form all tables use.
pub fn capwords(input: &str) -> String {
    input
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn class_list() -> impl Iterator<Item = &'static str> {
    CLASS_SPECS.iter().map(|(c, _)| *c)
}

/// Resolve user input (full name or shorthand) to a canonical class name.
pub fn canonical_class(input: &str) -> Option<&'static str> {
    let normalized = capwords(input);
    CLASS_SPECS
        .iter()
        .map(|(c, _)| *c)
        .find(|c| *c == normalized)
        .or_else(|| {
            CLASS_ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == normalized)
                .map(|(_, full)| *full)
        })
}

pub fn class_specs(class_name: &str) -> Option<&'static [&'static str]> {
    CLASS_SPECS
        .iter()
        .find(|(c, _)| *c == class_name)
        .map(|(_, specs)| *specs)
}

/// Resolve user input to a canonical spec for `class_name`, translating
/// shorthand. `None` when the class is unknown or the spec is not valid
/// for it.
pub fn canonical_spec(class_name: &str, input: &str) -> Option<&'static str> {
    let specs = class_specs(class_name)?;
    let normalized = capwords(input);
    specs.iter().copied().find(|s| *s == normalized).or_else(|| {
        SPEC_ABBREVIATIONS
            .iter()
            .find(|(c, _)| *c == class_name)
            .and_then(|(_, pairs)| {
                pairs
                    .iter()
                    .find(|(abbr, _)| *abbr == normalized)
                    .map(|(_, full)| *full)
            })
    })
}

/// Expand realm shorthand, otherwise title-case the input as typed.
pub fn canonical_realm(input: &str) -> String {
    let normalized = capwords(input);
    REALM_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == normalized)
        .map(|(_, full)| full.to_string())
        .unwrap_or(normalized)
}
