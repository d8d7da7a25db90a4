//! Build assets keyed by output filename.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Contents of one output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    contents: Vec<u8>,
}

impl Asset {
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Contents as text (lossy for non UTF-8 assets)
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }

    pub fn size(&self) -> usize {
        self.contents.len()
    }

    /// Replace the materialized contents
    pub fn replace(&mut self, contents: impl Into<Vec<u8>>) {
        self.contents = contents.into();
    }
}

impl From<String> for Asset {
    fn from(text: String) -> Self {
        Self::new(text.into_bytes())
    }
}

impl From<&str> for Asset {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

/// Assets ordered by filename
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap {
    assets: BTreeMap<String, Asset>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an asset, returning the previous one
    pub fn insert(&mut self, name: impl Into<String>, asset: Asset) -> Option<Asset> {
        self.assets.insert(name.into(), asset)
    }

    pub fn remove(&mut self, name: &str) -> Option<Asset> {
        self.assets.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Move every asset of `other` into this map
    pub fn merge(&mut self, other: AssetMap) {
        self.assets.extend(other.assets);
    }
}

impl IntoIterator for AssetMap {
    type Item = (String, Asset);
    type IntoIter = std::collections::btree_map::IntoIter<String, Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.into_iter()
    }
}
