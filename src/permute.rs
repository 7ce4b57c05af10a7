use std::collections::BTreeSet;

/// Highest permutation level understood by `generate`.
pub const MAX_LEVEL: u8 = 3;

const SEPARATORS: [&str; 4] = ["", "-", "_", "."];

const YEAR_TAGS: [&str; 12] = [
    "2020", "2021", "2022", "2023", "2024", "2025",
    "20", "21", "22", "23", "24", "25",
];

const NUMBER_TAGS: [&str; 9] = ["1", "2", "3", "01", "02", "03", "v1", "v2", "v3"];

const REGION_TAGS: [&str; 6] = ["us", "eu", "asia", "ap", "east", "west"];

const STORAGE_TAGS: [&str; 16] = [
    "storage", "bucket", "s3", "archive", "backup", "backups", "bak", "old",
    "logs", "media", "static", "cdn", "uploads", "downloads", "images", "docs",
];

/// Lowercase a raw word and make it safe for hostname-shaped bucket names:
/// whitespace and dots become `-`, wildcard characters are dropped.
fn normalize(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.trim().to_lowercase().chars() {
        if c == '*' {
            continue;
        }
        if c.is_whitespace() || c == '.' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

/// Expand base words into candidate bucket names. Deterministic, no I/O.
///
/// - `words`: raw wordlist entries (normalized here; empty results skipped)
/// - `level`: 0 = base word only, 1 = + environment tags, 2 = + year/number/
///   region tags, 3 = + storage affixes and env+year / env+region combos
/// - `environments`: tag list combined with each word at level >= 1
///
/// Each level strictly extends the previous one.
pub fn generate(words: &[String], level: u8, environments: &[String]) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = BTreeSet::new();
    let envs: Vec<String> = environments
        .iter()
        .map(|e| normalize(e))
        .filter(|e| !e.is_empty())
        .collect();

    for word in words {
        let base = normalize(word);
        if base.is_empty() {
            continue;
        }
        names.insert(base.clone());

        if level >= 1 {
            for env in envs.iter() {
                for sep in SEPARATORS.iter() {
                    names.insert(format!("{}{}{}", base, sep, env));
                    names.insert(format!("{}{}{}", env, sep, base));
                }
            }
        }

        if level >= 2 {
            let tags = YEAR_TAGS.iter().chain(NUMBER_TAGS.iter()).chain(REGION_TAGS.iter());
            for tag in tags {
                for sep in SEPARATORS.iter() {
                    names.insert(format!("{}{}{}", base, sep, tag));
                }
            }
        }

        if level >= 3 {
            for tag in STORAGE_TAGS.iter() {
                for sep in SEPARATORS.iter() {
                    names.insert(format!("{}{}{}", base, sep, tag));
                    names.insert(format!("{}{}{}", tag, sep, base));
                }
            }
            for env in envs.iter() {
                for sep in SEPARATORS.iter() {
                    for year in YEAR_TAGS.iter() {
                        names.insert(format!("{}{}{}{}{}", base, sep, env, sep, year));
                    }
                    for region in REGION_TAGS.iter() {
                        names.insert(format!("{}{}{}{}{}", base, sep, env, sep, region));
                    }
                }
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn level0_normalizes_and_dedups() {
        let set = generate(&words(&["Acme", "acme", " My App ", "*.acme.com"]), 0, &[]);
        assert!(set.contains("acme"));
        assert!(set.contains("my-app"));
        assert!(set.contains("-acme-com"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn empty_and_degenerate_input() {
        assert!(generate(&[], 3, &words(&["dev"])).is_empty());
        // words that normalize to nothing are skipped, not errors
        assert!(generate(&words(&["*", "  ", "**"]), 2, &words(&["dev"])).is_empty());
    }

    #[test]
    fn levels_strictly_extend() {
        let w = words(&["acme"]);
        let envs = words(&["dev", "prod", "qa"]);
        let mut prev = generate(&w, 0, &envs);
        for level in 1..=MAX_LEVEL {
            let cur = generate(&w, level, &envs);
            assert!(prev.iter().all(|n| cur.contains(n)), "level {} lost names", level);
            assert!(cur.len() > prev.len(), "level {} added nothing", level);
            prev = cur;
        }
    }

    #[test]
    fn generated_names_are_clean() {
        let set = generate(&words(&["*.Foo Bar.", "ACME Corp"]), 3, &words(&["Dev", " QA "]));
        for name in set.iter() {
            assert!(!name.contains(char::is_whitespace), "whitespace in {:?}", name);
            assert!(!name.contains('*'), "wildcard in {:?}", name);
            assert!(!name.chars().any(|c| c.is_uppercase()), "uppercase in {:?}", name);
        }
    }

    #[test]
    fn level1_exact_enumeration() {
        let set = generate(&words(&["acme"]), 1, &words(&["dev", "prod"]));
        let expected: BTreeSet<String> = [
            "acme",
            "acmedev", "acme-dev", "acme_dev", "acme.dev",
            "devacme", "dev-acme", "dev_acme", "dev.acme",
            "acmeprod", "acme-prod", "acme_prod", "acme.prod",
            "prodacme", "prod-acme", "prod_acme", "prod.acme",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn level2_appends_year_number_region_tags() {
        let set = generate(&words(&["acme"]), 2, &[]);
        for name in ["acme-2023", "acme2025", "acme_v2", "acme.us", "acme01", "acme-23"] {
            assert!(set.contains(name), "missing {:?}", name);
        }
        // level 2 tags are suffix-only
        assert!(!set.contains("2023-acme"));
    }

    #[test]
    fn level3_affixes_and_combos() {
        let set = generate(&words(&["acme"]), 3, &words(&["dev"]));
        for name in [
            "acme-backup", "backup-acme", "s3acme", "acme.cdn",
            "acme-dev-2023", "acme_dev_us", "acmedev2024",
        ] {
            assert!(set.contains(name), "missing {:?}", name);
        }
    }
}
