pub mod engine;
pub mod normalizer;
pub mod resolver;
pub mod segmenter;
pub mod trie;
pub mod types;
