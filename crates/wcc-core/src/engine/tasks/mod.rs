pub mod closure;
pub mod cycle_search;
pub mod pair_error;
