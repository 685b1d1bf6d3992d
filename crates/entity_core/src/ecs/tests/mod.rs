//! Frame-level tests driving a whole world
