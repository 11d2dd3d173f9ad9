pub mod clarabel_minimizer;
pub mod minimizer;
pub mod v2g_opt;
