pub mod trace_tests;
