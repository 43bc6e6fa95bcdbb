//! The only purpose of this file is to run the README.md as if it was a
//! doctest. Failures show up clearly as 'readme' failures.

doc_comment::doctest!("../README.md");
