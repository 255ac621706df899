use std::{env, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let proto_dir = manifest_dir.join("proto");
    let onnx_proto = proto_dir.join("onnx.proto");

    println!("cargo:rerun-if-changed={}", onnx_proto.display());

    // bytes fields decode into prost::bytes::Bytes so raw tensor payloads
    // can be passed through without copying
    prost_build::Config::new()
        .bytes(["."])
        .compile_protos(&[&onnx_proto], &[&proto_dir])?;

    Ok(())
}
