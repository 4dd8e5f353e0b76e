pub mod assembler;
pub mod augmenter;
pub mod backends;
pub mod oracle;
pub mod pipeline;
pub mod reconciler;
