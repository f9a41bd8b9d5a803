pub mod fixed_arena;
pub mod lsb_radix_sort;
