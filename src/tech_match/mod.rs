use anyhow::Context;
use fxhash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use tracing::debug;

pub(crate) const DEFAULT_DICTIONARY: &str = include_str!("dictionary.toml");
pub const DEFAULT_MIN_LENGTH: usize = 4;
pub const DEFAULT_MAX_DISTANCE: usize = 2;


#[derive(Deserialize)]
struct DictionaryFile {
    technologies: Vec<String>,
    #[serde(default)]
    excluded: Vec<String>
}


/// The canonical technology names that free text is normalized to, and the words that must never
/// resolve to one of them.
///
/// Loaded once before matching begins and never modified afterwards.
#[derive(Debug, Clone)]
pub struct Dictionary {
    technologies: Vec<String>,
    /// Lowercased copies of `technologies`, index-aligned.
    lowercase: Vec<String>,
    /// Character counts of `lowercase`, index-aligned.
    lengths: Vec<usize>,
    excluded: FxHashSet<String>
}


impl Dictionary {
    pub fn new<T, E>(technologies: T, excluded: E) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        E: IntoIterator,
        E::Item: AsRef<str>
    {
        let technologies: Vec<String> = technologies.into_iter().map(Into::into).collect();
        let lowercase: Vec<String> = technologies.iter().map(|x| x.to_lowercase()).collect();
        let lengths = lowercase.iter().map(|x| x.chars().count()).collect();
        Self {
            technologies,
            lowercase,
            lengths,
            excluded: excluded.into_iter().map(|x| x.as_ref().to_lowercase()).collect()
        }
    }

    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let file: DictionaryFile = toml::from_str(source).context("Dictionary is not valid TOML")?;
        if let Some(name) = file.technologies.iter().find(|x| x.contains(char::is_whitespace)) {
            anyhow::bail!("Technology {name:?} has more than one word, descriptions are matched word by word");
        }
        let dictionary = Self::new(file.technologies, file.excluded);
        if dictionary.is_empty() {
            anyhow::bail!("Dictionary does not list any technologies");
        }
        Ok(dictionary)
    }

    /// The dictionary that ships with the binary.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml(DEFAULT_DICTIONARY)
    }

    pub fn len(&self) -> usize {
        self.technologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.technologies.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.technologies.iter().any(|x| x == name)
    }

    /// `word` must already be lowercase.
    pub fn is_excluded(&self, word: &str) -> bool {
        self.excluded.contains(word)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Dictionary entries and candidates shorter than this (in characters) only match exactly.
    pub min_length: usize,
    /// Fuzzy matches further than this are rejected.
    pub max_distance: usize
}


impl Default for MatcherConfig {
    fn default() -> Self {
        Self { min_length: DEFAULT_MIN_LENGTH, max_distance: DEFAULT_MAX_DISTANCE }
    }
}


#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchStats {
    pub lookups: usize,
    pub cache_hits: usize,
    /// How many times the dictionary was scanned; at most once per distinct lowercased word.
    pub scans: usize
}


/// Maps lowercased words to the index of the dictionary entry they resolved to, or `None` when
/// they resolved to nothing. Only ever grows during a run.
#[derive(Debug, Default)]
struct MatchCache(FxHashMap<String, Option<usize>>);


impl MatchCache {
    fn get(&self, key: &str) -> Option<Option<usize>> {
        self.0.get(key).copied()
    }

    fn insert(&mut self, key: String, resolved: Option<usize>) {
        self.0.insert(key, resolved);
    }
}


/// Resolves free-text words to canonical technology names with a memoized edit distance search.
pub struct TechMatcher {
    dictionary: Dictionary,
    config: MatcherConfig,
    cache: MatchCache,
    stats: MatchStats
}


impl TechMatcher {
    pub fn new(dictionary: Dictionary, config: MatcherConfig) -> Self {
        Self { dictionary, config, cache: MatchCache::default(), stats: MatchStats::default() }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn stats(&self) -> MatchStats {
        self.stats
    }

    /// Returns the canonical technology name closest to `candidate`, if any is close enough.
    ///
    /// Exact case-insensitive matches always win. Excluded words never match, even if they are in
    /// the dictionary. Otherwise the entry with the smallest edit distance is chosen, the first one
    /// in dictionary order winning ties, and only accepted if that distance is within
    /// `max_distance`.
    pub fn resolve(&mut self, candidate: &str) -> Option<&str> {
        self.stats.lookups += 1;
        let key = candidate.to_lowercase();

        let resolved = match self.cache.get(&key) {
            Some(resolved) => {
                self.stats.cache_hits += 1;
                debug!("Found {candidate} in match cache");
                resolved
            }
            None => {
                let resolved = if self.dictionary.is_excluded(&key) {
                    None
                } else {
                    self.search(&key)
                };
                self.cache.insert(key, resolved);
                resolved
            }
        };

        resolved.map(|i| self.dictionary.technologies[i].as_str())
    }

    fn search(&mut self, key: &str) -> Option<usize> {
        if key.is_empty() {
            return None;
        }
        self.stats.scans += 1;
        let key_len = key.chars().count();
        let mut best: Option<(usize, usize)> = None;

        for (i, entry) in self.dictionary.lowercase.iter().enumerate() {
            if entry == key {
                debug!("Found exact match for {key}");
                return Some(i);
            }
            if self.dictionary.lengths[i] < self.config.min_length || key_len < self.config.min_length {
                continue;
            }
            let distance = levenshtein(entry, key);
            // Strictly smaller, so the first minimal entry keeps ties
            if best.map_or(true, |(_, min)| distance < min) {
                best = Some((i, distance));
            }
        }

        match best {
            Some((i, distance)) if distance <= self.config.max_distance => {
                debug!(
                    "Found closest match for {key}: {} (distance: {distance})",
                    self.dictionary.technologies[i]
                );
                Some(i)
            }
            _ => None
        }
    }
}


/// Number of single character insertions, deletions or substitutions needed to turn `a` into `b`.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}


#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn scenario_matcher(min_length: usize) -> TechMatcher {
        TechMatcher::new(
            Dictionary::new(["React", "Node"], ["and"]),
            MatcherConfig { min_length, max_distance: 1 }
        )
    }

    /// Full matrix implementation to check the two row version against.
    fn reference_levenshtein(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let mut matrix = vec![vec![0; b.len() + 1]; a.len() + 1];
        for i in 0..=a.len() {
            matrix[i][0] = i;
        }
        for j in 0..=b.len() {
            matrix[0][j] = j;
        }
        for i in 1..=a.len() {
            for j in 1..=b.len() {
                let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
                matrix[i][j] = (matrix[i - 1][j] + 1)
                    .min(matrix[i][j - 1] + 1)
                    .min(matrix[i - 1][j - 1] + cost);
            }
        }
        matrix[a.len()][b.len()]
    }

    #[test]
    fn levenshtein_known_values() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("react", "reac"), 1);
        assert_eq!(levenshtein("año", "ano"), 1);
    }

    #[test]
    fn scenario_from_small_dictionary() {
        let mut matcher = scenario_matcher(3);
        assert_eq!(matcher.resolve("react"), Some("React"));
        assert_eq!(matcher.resolve("Reac"), Some("React"));
        assert_eq!(matcher.resolve("and"), None);
        assert_eq!(matcher.resolve("xyz"), None);
        assert_eq!(matcher.resolve("nod"), Some("Node"));
    }

    #[test]
    fn short_candidates_only_match_exactly() {
        let mut matcher = scenario_matcher(4);
        assert_eq!(matcher.resolve("nod"), None);
        assert_eq!(matcher.resolve("NODE"), Some("Node"));
    }

    #[test]
    fn exact_match_ignores_thresholds() {
        let mut matcher = TechMatcher::new(
            Dictionary::new(["C", "Go"], Vec::<String>::new()),
            MatcherConfig { min_length: 10, max_distance: 0 }
        );
        assert_eq!(matcher.resolve("c"), Some("C"));
        assert_eq!(matcher.resolve("GO"), Some("Go"));
    }

    #[test]
    fn excluded_words_never_match_even_if_listed() {
        let mut matcher = TechMatcher::new(Dictionary::new(["Go", "Rust"], ["go"]), MatcherConfig::default());
        assert_eq!(matcher.resolve("Go"), None);
        assert_eq!(matcher.resolve("rust"), Some("Rust"));
        assert_eq!(matcher.stats().scans, 1);
    }

    #[test]
    fn empty_candidate_never_matches() {
        let mut matcher = scenario_matcher(0);
        assert_eq!(matcher.resolve(""), None);
    }

    #[test]
    fn ties_keep_first_entry() {
        let mut matcher = TechMatcher::new(
            Dictionary::new(["Vault", "Vaulx"], Vec::<String>::new()),
            MatcherConfig { min_length: 3, max_distance: 1 }
        );
        // "vaulz" is one substitution away from both
        assert_eq!(matcher.resolve("vaulz"), Some("Vault"));
    }

    #[test]
    fn closer_later_entry_beats_earlier_one() {
        let mut matcher = TechMatcher::new(
            Dictionary::new(["Reacts", "React"], Vec::<String>::new()),
            MatcherConfig { min_length: 3, max_distance: 2 }
        );
        assert_eq!(matcher.resolve("reac"), Some("React"));
    }

    #[test]
    fn second_lookup_hits_cache() {
        let mut matcher = scenario_matcher(3);
        assert_eq!(matcher.resolve("Reac"), Some("React"));
        assert_eq!(matcher.resolve("reac"), Some("React"));
        assert_eq!(matcher.resolve("xyz"), None);
        assert_eq!(matcher.resolve("XYZ"), None);
        let stats = matcher.stats();
        assert_eq!(stats.lookups, 4);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.scans, 2);
    }

    #[test]
    fn builtin_dictionary_parses() {
        let dictionary = Dictionary::builtin().unwrap();
        assert!(dictionary.contains("React"));
        assert!(dictionary.is_excluded("experiencia"));
        let mut matcher = TechMatcher::new(dictionary, MatcherConfig::default());
        assert_eq!(matcher.resolve("Javascrip"), Some("JavaScript"));
        assert_eq!(matcher.resolve("python"), Some("Python"));
        assert_eq!(matcher.resolve("experiencia"), None);
    }

    #[test]
    fn dictionary_without_technologies_is_rejected() {
        assert!(Dictionary::from_toml("technologies = []").is_err());
        assert!(Dictionary::from_toml("excluded = [\"and\"]").is_err());
    }

    #[test]
    fn multi_word_technologies_are_rejected() {
        let err = Dictionary::from_toml("technologies = [\"Rust\", \"Power BI\"]").unwrap_err();
        assert!(err.to_string().contains("Power BI"));
    }

    proptest! {
        #[test]
        fn levenshtein_matches_reference(a in "[a-zñ]{0,8}", b in "[a-zñ]{0,8}") {
            prop_assert_eq!(levenshtein(&a, &b), reference_levenshtein(&a, &b));
        }

        #[test]
        fn levenshtein_is_symmetric(a in "\\PC{0,10}", b in "\\PC{0,10}") {
            prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
        }

        #[test]
        fn levenshtein_identity(a in "\\PC{0,12}") {
            prop_assert_eq!(levenshtein(&a, &a), 0);
        }

        #[test]
        fn levenshtein_triangle_inequality(a in "[abc]{0,6}", b in "[abc]{0,6}", c in "[abc]{0,6}") {
            prop_assert!(levenshtein(&a, &c) <= levenshtein(&a, &b) + levenshtein(&b, &c));
        }

        #[test]
        fn resolve_is_idempotent(word in "[A-Za-z]{0,10}") {
            let mut matcher = TechMatcher::new(Dictionary::builtin().unwrap(), MatcherConfig::default());
            let first = matcher.resolve(&word).map(str::to_string);
            let scans = matcher.stats().scans;
            let second = matcher.resolve(&word).map(str::to_string);
            prop_assert_eq!(first, second);
            prop_assert_eq!(matcher.stats().scans, scans);
        }

        #[test]
        fn resolved_names_come_from_dictionary(word in "[A-Za-z+#.]{1,10}") {
            let mut matcher = TechMatcher::new(Dictionary::builtin().unwrap(), MatcherConfig::default());
            if let Some(name) = matcher.resolve(&word).map(str::to_string) {
                prop_assert!(matcher.dictionary().contains(&name));
            }
        }

        #[test]
        fn exact_entries_always_resolve_to_themselves(idx in 0usize..4, upper in any::<bool>()) {
            let names = ["React", "Node", "Kubernetes", "C#"];
            let mut matcher = TechMatcher::new(
                Dictionary::new(names, Vec::<String>::new()),
                MatcherConfig { min_length: 20, max_distance: 0 }
            );
            let word = if upper { names[idx].to_uppercase() } else { names[idx].to_lowercase() };
            prop_assert_eq!(matcher.resolve(&word), Some(names[idx]));
        }
    }
}
