pub mod local_optimum;
