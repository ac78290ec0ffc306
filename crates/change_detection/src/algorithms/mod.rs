pub mod normalize;
pub mod difference;
pub mod segmentation;

pub use normalize::*;
pub use difference::*;
pub use segmentation::*;
