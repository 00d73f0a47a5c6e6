/// Interning tables for the trained model:
/// - the feature table maps each segment feature string to a dense index
/// - the label table holds the label vocabulary derived from the corpus
use std::collections::BTreeMap;

use crate::data::Label;

/// Index of the catch-all outside label in every `LabelSymbolTable`
pub const OUTSIDE_LABEL_IDX: usize = 0;

#[derive(PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct FeatureSymbolTable {
    string_to_index: BTreeMap<String, u32>,
    available_index: u32,
}

impl FeatureSymbolTable {
    /// Add a symbol to the symbol table, if it doesn't already exist, and return
    /// the corresponding index
    pub fn add_symbol(&mut self, symbol: String) -> u32 {
        self.string_to_index
            .get(&symbol)
            .cloned()
            .unwrap_or_else(|| {
                let symbol_index = self.available_index;
                self.available_index += 1;
                self.string_to_index.insert(symbol, symbol_index);
                symbol_index
            })
    }

    /// Find the index of a symbol in the symbol table.
    pub fn find_symbol(&self, symbol: &str) -> Option<&u32> {
        self.string_to_index.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.string_to_index.len()
    }
}

/// Label vocabulary of a trained model. The outside label is always present
/// and always sits at index 0, so the decoder can special-case it without a
/// lookup.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct LabelSymbolTable {
    labels: Vec<Label>,
}

impl Default for LabelSymbolTable {
    fn default() -> LabelSymbolTable {
        LabelSymbolTable {
            labels: vec![Label::outside()],
        }
    }
}

impl LabelSymbolTable {
    pub fn new() -> LabelSymbolTable {
        LabelSymbolTable::default()
    }

    /// Add a label to the vocabulary if it isn't already there, and return its index
    pub fn add_label(&mut self, label: &Label) -> usize {
        self.find_label(label).unwrap_or_else(|| {
            self.labels.push(label.clone());
            self.labels.len() - 1
        })
    }

    /// Find the index of a label in the vocabulary
    pub fn find_label(&self, label: &Label) -> Option<usize> {
        self.labels.iter().position(|known| known == label)
    }

    /// Find the label corresponding to an index in the vocabulary
    pub fn find_index(&self, idx: usize) -> Option<&Label> {
        self.labels.get(idx)
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}
