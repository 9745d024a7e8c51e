//! Unit test suite entry point.

mod unit;
