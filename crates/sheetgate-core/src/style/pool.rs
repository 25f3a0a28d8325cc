//! Style pool for deduplication

use super::Style;
use ahash::AHashMap;

/// Workbook-wide table of distinct styles
///
/// Cells reference styles by index. Inserting a style that is already present
/// returns the existing index, so copying styles between workbooks never grows the
/// table beyond the number of distinct styles.
#[derive(Debug, Clone)]
pub struct StylePool {
    /// All unique styles (index 0 is default)
    styles: Vec<Style>,
    index_map: AHashMap<Style, u32>,
}

impl StylePool {
    /// Create a new style pool with default style at index 0
    pub fn new() -> Self {
        let default = Style::default();
        let mut index_map = AHashMap::with_capacity(64);
        index_map.insert(default.clone(), 0);

        Self {
            styles: vec![default],
            index_map,
        }
    }

    /// Get or create a style, returning its index
    pub fn get_or_insert(&mut self, style: Style) -> u32 {
        if let Some(&idx) = self.index_map.get(&style) {
            return idx;
        }

        let idx = self.styles.len() as u32;
        self.index_map.insert(style.clone(), idx);
        self.styles.push(style);
        idx
    }

    /// Index of a style if it is already pooled
    pub fn find(&self, style: &Style) -> Option<u32> {
        self.index_map.get(style).copied()
    }

    /// Get a style by index
    pub fn get(&self, index: u32) -> Option<&Style> {
        self.styles.get(index as usize)
    }

    /// Get a style by index, falling back to the default style
    pub fn get_or_default(&self, index: u32) -> &Style {
        self.get(index).unwrap_or(&self.styles[0])
    }

    /// Get the number of styles, including the default
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Check if the pool holds only the default style
    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }

    /// Iterate over all styles with their indices
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Style)> {
        self.styles.iter().enumerate().map(|(i, s)| (i as u32, s))
    }
}

impl Default for StylePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Color, FillStyle};

    #[test]
    fn test_default_style() {
        let pool = StylePool::new();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0), Some(&Style::default()));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_deduplication() {
        let mut pool = StylePool::new();

        let idx1 = pool.get_or_insert(Style::new().bold(true));
        let idx2 = pool.get_or_insert(Style::new().bold(true));
        let idx3 = pool.get_or_insert(Style::new().italic(true));

        assert_eq!(idx1, idx2);
        assert_ne!(idx1, idx3);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.get_or_insert(Style::default()), 0);
    }

    #[test]
    fn test_fill_variant_is_distinct() {
        let mut pool = StylePool::new();
        let base = Style::new().number_format("yyyy-mm-dd");
        let highlighted = base.clone().with_fill(FillStyle::solid(Color::argb(0xFF, 0xFF, 0xC7, 0xCE)));

        let base_idx = pool.get_or_insert(base);
        let hl_idx = pool.get_or_insert(highlighted.clone());
        assert_ne!(base_idx, hl_idx);
        assert_eq!(pool.find(&highlighted), Some(hl_idx));
        assert_eq!(pool.get_or_default(999), &Style::default());
    }
}
