pub mod candidate;
pub mod duplicate;
pub mod extract;
pub mod hash;
pub mod http;
pub mod image;
pub mod manifest;
pub mod perceptual;
pub mod review;
pub mod robots;
pub mod scanner;
pub mod urls;

#[cfg(test)]
pub(crate) mod testing;
