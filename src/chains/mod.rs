pub mod tron;
