//! Build script for Plexus.
//!
//! Currently a no-op placeholder. The envelope and counter wire types are
//! implemented directly in Rust (see src/wire/ and src/primitives/) rather
//! than generated from protobuf definitions.
//!
//! This approach was chosen because:
//! - It avoids proto file dependencies and build-time codegen complexity
//! - It keeps the field-tag layout visible next to the code that relies on it
//! - The wire surface is a small, stable set of messages
//!
//! If proto-based codegen is needed in the future, prost-build can be
//! configured here to compile proto files from a `proto/` directory.

fn main() {
    // Rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
