pub mod join_tests;
