//! O(1) symbol lookup by name/file/class, accelerating the engine's
//! "find instantiation" / "find class" / "find method" scans (§6 auxiliary
//! indexer contract).
//!
//! Built directly on the teacher's `cross_file/symbol_index.rs` shape:
//! `DashMap`-backed, name-indexed, with `Arc`-shared records so callers can
//! hold a symbol past an index mutation.

use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Property,
}

#[derive(Debug, Clone)]
pub struct IndexedSymbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    /// Owning class for `Method`/`Property` symbols.
    pub class_name: Option<String>,
    pub file: String,
    pub line: u32,
    pub params: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Exact,
    Partial,
    Regex,
    FilterOnly,
}

pub struct SearchResult {
    pub symbol: Arc<IndexedSymbol>,
    pub score: u32,
    pub matched_by: MatchedBy,
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    pub is_regex: bool,
    /// Parameter name a match must carry to earn the +30 bonus.
    pub param_filter: Option<String>,
    pub kind_filter: Option<SymbolKind>,
}

/// Name-indexed, file-indexed, `Arc`-shared symbol store.
#[derive(Default)]
pub struct CodeIndexer {
    symbols: DashMap<String, Arc<IndexedSymbol>>,
    by_name: DashMap<String, Vec<String>>,
    by_file: DashMap<String, Vec<String>>,
    references: DashMap<String, Vec<Reference>>,
}

impl CodeIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_symbol(&self, symbol: IndexedSymbol) -> Arc<IndexedSymbol> {
        let arc = Arc::new(symbol);
        self.by_name
            .entry(arc.name.clone())
            .or_default()
            .push(arc.id.clone());
        self.by_file
            .entry(arc.file.clone())
            .or_default()
            .push(arc.id.clone());
        self.symbols.insert(arc.id.clone(), arc.clone());
        arc
    }

    pub fn add_reference(&self, reference: Reference) {
        self.references
            .entry(reference.name.clone())
            .or_default()
            .push(reference);
    }

    pub fn get_by_name(&self, name: &str) -> Vec<Arc<IndexedSymbol>> {
        self.by_name
            .get(name)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.symbols.get(id).map(|e| e.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_function(&self, name: &str) -> Option<Arc<IndexedSymbol>> {
        self.get_by_name(name)
            .into_iter()
            .find(|s| s.kind == SymbolKind::Function)
    }

    pub fn get_class(&self, name: &str) -> Option<Arc<IndexedSymbol>> {
        self.get_by_name(name)
            .into_iter()
            .find(|s| s.kind == SymbolKind::Class)
    }

    pub fn get_method(&self, class: &str, method: &str) -> Option<Arc<IndexedSymbol>> {
        self.get_by_name(method).into_iter().find(|s| {
            s.kind == SymbolKind::Method && s.class_name.as_deref() == Some(class)
        })
    }

    pub fn get_symbols_in_file(&self, file: &str) -> Vec<Arc<IndexedSymbol>> {
        self.by_file
            .get(file)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.symbols.get(id).map(|e| e.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Prefers a same-file match, then same-language (by file extension),
    /// per §9's REDESIGN FLAGS — "any method with that name in any class"
    /// is unsound and is not this implementation's fallback.
    pub fn find_definition(&self, file: &str, _line: u32, name: &str) -> Option<Arc<IndexedSymbol>> {
        let candidates = self.get_by_name(name);
        if candidates.is_empty() {
            return None;
        }
        if let Some(same_file) = candidates.iter().find(|s| s.file == file) {
            return Some(same_file.clone());
        }
        let ext = file.rsplit('.').next();
        if let Some(ext) = ext {
            if let Some(same_lang) = candidates
                .iter()
                .find(|s| s.file.rsplit('.').next() == Some(ext))
            {
                return Some(same_lang.clone());
            }
        }
        candidates.into_iter().next()
    }

    /// Scoring per §6: exact=100, regex=75, partial=50, +30 parameter
    /// match, +10 pass-filter-only.
    pub fn search(&self, query: &SearchQuery) -> Vec<SearchResult> {
        let mut results = Vec::new();
        let compiled_regex = query.is_regex.then(|| Regex::new(&query.text).ok()).flatten();
        let lower_query = query.text.to_ascii_lowercase();

        for entry in self.symbols.iter() {
            let symbol = entry.value().clone();
            if let Some(kind) = query.kind_filter {
                if symbol.kind != kind {
                    continue;
                }
            }

            let mut score = 0u32;
            let mut matched_by = None;

            if !query.text.is_empty() {
                if let Some(re) = &compiled_regex {
                    if re.is_match(&symbol.name) {
                        score = 75;
                        matched_by = Some(MatchedBy::Regex);
                    }
                } else if symbol.name == query.text {
                    score = 100;
                    matched_by = Some(MatchedBy::Exact);
                } else if symbol.name.to_ascii_lowercase().contains(&lower_query) {
                    score = 50;
                    matched_by = Some(MatchedBy::Partial);
                }
            } else if query.kind_filter.is_some() {
                score = 10;
                matched_by = Some(MatchedBy::FilterOnly);
            }

            let Some(matched_by) = matched_by else {
                continue;
            };

            if let Some(param) = &query.param_filter {
                if symbol.params.iter().any(|p| p == param) {
                    score += 30;
                }
            }

            results.push(SearchResult {
                symbol,
                score,
                matched_by,
            });
        }

        results.sort_by_key(|r| std::cmp::Reverse(r.score));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(id: &str, name: &str, file: &str) -> IndexedSymbol {
        IndexedSymbol {
            id: id.to_string(),
            name: name.to_string(),
            kind: SymbolKind::Function,
            class_name: None,
            file: file.to_string(),
            line: 1,
            params: vec!["k".to_string()],
        }
    }

    #[test]
    fn exact_match_scores_100() {
        let indexer = CodeIndexer::new();
        indexer.add_symbol(symbol("1", "get", "a.php"));
        let results = indexer.search(&SearchQuery {
            text: "get".to_string(),
            ..Default::default()
        });
        assert_eq!(results[0].score, 100);
        assert_eq!(results[0].matched_by, MatchedBy::Exact);
    }

    #[test]
    fn partial_match_scores_50_and_param_bonus_applies() {
        let indexer = CodeIndexer::new();
        indexer.add_symbol(symbol("1", "getValue", "a.php"));
        let results = indexer.search(&SearchQuery {
            text: "get".to_string(),
            param_filter: Some("k".to_string()),
            ..Default::default()
        });
        assert_eq!(results[0].score, 80);
    }

    #[test]
    fn find_definition_prefers_same_file() {
        let indexer = CodeIndexer::new();
        indexer.add_symbol(symbol("1", "get", "other.php"));
        indexer.add_symbol(symbol("2", "get", "target.php"));
        let found = indexer.find_definition("target.php", 10, "get").unwrap();
        assert_eq!(found.file, "target.php");
    }

    #[test]
    fn get_symbols_in_file_returns_only_that_files_symbols() {
        let indexer = CodeIndexer::new();
        indexer.add_symbol(symbol("1", "a", "x.php"));
        indexer.add_symbol(symbol("2", "b", "y.php"));
        let results = indexer.get_symbols_in_file("x.php");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "a");
    }
}
