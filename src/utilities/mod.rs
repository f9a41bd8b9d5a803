mod bounding_box;
pub use self::bounding_box::*;

pub mod collections;
pub mod prefix_sum;
pub mod thread_dispatcher;
