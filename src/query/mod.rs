pub mod dead_code;
