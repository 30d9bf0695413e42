mod support;

mod config_tests;
mod db_tests;
mod scanner_tests;
mod session_tests;
