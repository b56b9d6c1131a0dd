mod catch_up_tests;
mod header_cache_tests;
