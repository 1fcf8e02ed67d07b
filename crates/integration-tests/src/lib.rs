//! End-to-end tests for the review pipeline live in `tests/`.
