//! End-to-end tests for the SLX workspace live in `tests/`.
