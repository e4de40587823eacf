fn main() {
    println!("cargo:rerun-if-changed=proto/kinetic.proto");
    prost_build::compile_protos(&["proto/kinetic.proto"], &["proto/"])
        .expect("failed to compile kinetic.proto");
}
