//! Stable, deterministic color assignment for logical series.
//!
//! A metric must keep its color while the user toggles currency or time
//! window, even though currency toggles swap the underlying field names
//! (`revenue_usd` vs `revenue_sol`). Keys are therefore collapsed to a base
//! name by stripping known qualifier suffixes, and indices are pinned on
//! first encounter for the lifetime of one dataset.

use ahash::AHashMap;

/// Opaque RGB color handed to the rendering layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// MS Office palette; indices wrap modulo its length.
pub const PALETTE: [Rgb; 10] = [
    Rgb { r: 68, g: 114, b: 196 },  // blue
    Rgb { r: 237, g: 125, b: 49 },  // orange
    Rgb { r: 165, g: 165, b: 165 }, // gray
    Rgb { r: 255, g: 192, b: 0 },   // gold
    Rgb { r: 91, g: 155, b: 213 },  // light blue
    Rgb { r: 112, g: 173, b: 71 },  // green
    Rgb { r: 38, g: 68, b: 120 },   // dark blue
    Rgb { r: 158, g: 72, b: 14 },   // dark orange
    Rgb { r: 99, g: 99, b: 99 },    // dark gray
    Rgb { r: 153, g: 115, b: 0 },   // brownish
];

/// Qualifier suffixes that mark currency/chain variants of one metric.
const SUFFIX_TOKENS: [&str; 8] = ["usd", "usdc", "usdt", "sol", "eth", "btc", "native", "token"];

/// Strip a trailing qualifier token, case-folded: `revenue_usd` and
/// `Revenue USD` both become `revenue`.
pub fn base_field_name(key: &str) -> String {
    let folded = key.to_lowercase().replace([' ', '-'], "_");
    if let Some((head, tail)) = folded.rsplit_once('_') {
        if SUFFIX_TOKENS.contains(&tail) {
            return head.to_string();
        }
    }
    folded
}

/// Per-dataset color-index registry.
///
/// Indices are assigned once, on first encounter in a deterministic pass
/// over the full key set, and never reassigned by later recomputation. Keys
/// sharing a base name share an index. When the full key set shows no suffix
/// variants at all, the initial pass assigns by stable sort instead, so a
/// later filter toggle that swaps a small subset of fields cannot reshuffle
/// the colors of unrelated fields.
#[derive(Debug, Clone, Default)]
pub struct ColorAssignment {
    seen: Vec<String>,
    indices: AHashMap<String, usize>,
    base_indices: AHashMap<String, usize>,
    next: usize,
}

impl ColorAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register series keys, assigning indices to any not yet seen.
    /// `preferred` entries always win for their key.
    pub fn observe(&mut self, keys: &[String], preferred: &AHashMap<String, usize>) {
        for key in keys {
            if !self.seen.contains(key) {
                self.seen.push(key.clone());
            }
        }
        if self.indices.is_empty() {
            self.assign_initial(preferred);
        } else {
            self.assign_incremental(preferred);
        }
    }

    fn assign_initial(&mut self, preferred: &AHashMap<String, usize>) {
        if self.seen.is_empty() {
            return;
        }
        let bases: Vec<String> = self.seen.iter().map(|k| base_field_name(k)).collect();
        let distinct_bases = {
            let mut b = bases.clone();
            b.sort();
            b.dedup();
            b.len()
        };
        if distinct_bases < self.seen.len() {
            // Suffix variants present: index by base first-appearance order.
            let seen = self.seen.clone();
            for (key, base) in seen.into_iter().zip(bases) {
                let idx = self.index_for_base(base);
                self.indices.insert(key, idx);
            }
        } else {
            // No variants anywhere: stable sort of the full key set.
            let mut sorted = self.seen.clone();
            sorted.sort();
            for (idx, key) in sorted.into_iter().enumerate() {
                self.base_indices.insert(base_field_name(&key), idx);
                self.indices.insert(key, idx);
            }
            self.next = self.seen.len();
        }
        self.apply_preferred(preferred);
    }

    fn assign_incremental(&mut self, preferred: &AHashMap<String, usize>) {
        let unassigned: Vec<String> = self
            .seen
            .iter()
            .filter(|k| !self.indices.contains_key(*k))
            .cloned()
            .collect();
        for key in unassigned {
            let idx = self.index_for_base(base_field_name(&key));
            self.indices.insert(key, idx);
        }
        self.apply_preferred(preferred);
    }

    fn index_for_base(&mut self, base: String) -> usize {
        match self.base_indices.get(&base) {
            Some(idx) => *idx,
            None => {
                let idx = self.next;
                self.next += 1;
                self.base_indices.insert(base, idx);
                idx
            }
        }
    }

    fn apply_preferred(&mut self, preferred: &AHashMap<String, usize>) {
        for (key, idx) in preferred {
            if self.indices.contains_key(key) {
                self.indices.insert(key.clone(), *idx);
            }
        }
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.indices.get(key).copied()
    }

    pub fn color_of(&self, key: &str) -> Option<Rgb> {
        self.index_of(key).map(|i| PALETTE[i % PALETTE.len()])
    }

    /// All keys ever observed, in first-appearance order.
    pub fn seen_keys(&self) -> &[String] {
        &self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ks: &[&str]) -> Vec<String> {
        ks.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn suffix_variants_share_an_index() {
        let mut colors = ColorAssignment::new();
        colors.observe(&keys(&["revenue_usd", "revenue_sol", "fees_usd"]), &AHashMap::new());
        assert_eq!(colors.index_of("revenue_usd"), colors.index_of("revenue_sol"));
        assert_eq!(colors.index_of("revenue_usd"), Some(0));
        assert_eq!(colors.index_of("fees_usd"), Some(1));
    }

    #[test]
    fn no_suffixes_falls_back_to_sorted_order() {
        let mut colors = ColorAssignment::new();
        colors.observe(&keys(&["gamma", "alpha", "beta"]), &AHashMap::new());
        assert_eq!(colors.index_of("alpha"), Some(0));
        assert_eq!(colors.index_of("beta"), Some(1));
        assert_eq!(colors.index_of("gamma"), Some(2));
    }

    #[test]
    fn later_observation_never_reassigns() {
        let mut colors = ColorAssignment::new();
        colors.observe(&keys(&["revenue_usd", "fees_usd"]), &AHashMap::new());
        let revenue = colors.index_of("revenue_usd");
        let fees = colors.index_of("fees_usd");
        colors.observe(&keys(&["revenue_sol", "fees_sol", "volume_sol"]), &AHashMap::new());
        assert_eq!(colors.index_of("revenue_usd"), revenue);
        assert_eq!(colors.index_of("fees_usd"), fees);
        assert_eq!(colors.index_of("revenue_sol"), revenue);
        assert_eq!(colors.index_of("fees_sol"), fees);
        assert_eq!(colors.index_of("volume_sol"), Some(2));
    }

    #[test]
    fn preferred_color_wins() {
        let mut preferred = AHashMap::new();
        preferred.insert("revenue_usd".to_string(), 7);
        let mut colors = ColorAssignment::new();
        colors.observe(&keys(&["revenue_usd", "revenue_sol"]), &preferred);
        assert_eq!(colors.index_of("revenue_usd"), Some(7));
        assert_eq!(colors.index_of("revenue_sol"), Some(0));
    }

    #[test]
    fn base_name_strips_known_tokens_only() {
        assert_eq!(base_field_name("revenue_usd"), "revenue");
        assert_eq!(base_field_name("Revenue USD"), "revenue");
        assert_eq!(base_field_name("revenue-eth"), "revenue");
        assert_eq!(base_field_name("revenue_total"), "revenue_total");
        assert_eq!(base_field_name("usd"), "usd");
    }
}
