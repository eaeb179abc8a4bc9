use std::env;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Generating Dapr runtime types...");

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let out_dir = manifest_dir.join("src/proto/generated");
    let proto_folder = manifest_dir.join("proto");

    let proto_files = [
        proto_folder.join("dapr/proto/common/v1/common.proto"),
        proto_folder.join("dapr/proto/runtime/v1/dapr.proto"),
        proto_folder.join("google/rpc/status.proto"),
    ];

    if !out_dir.exists() {
        fs::create_dir_all(&out_dir)?;
    }

    // Calls are issued through `tonic::client::Grpc` directly, only the messages are needed.
    tonic_prost_build::configure()
        .build_server(false)
        .build_client(false)
        .out_dir(&out_dir)
        .compile_protos(&proto_files, &[proto_folder])?;

    println!("Done! Generated files are in src/proto/generated");

    Ok(())
}
