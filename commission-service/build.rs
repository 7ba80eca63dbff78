fn main() -> Result<(), Box<dyn std::error::Error>> {
    unsafe {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let out_dir = std::path::PathBuf::from(std::env::var("OUT_DIR")?);

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .file_descriptor_set_path(out_dir.join("commission_descriptor.bin"))
        .compile_protos(
            &["../proto/roofcrm/commission/v1/commission.proto"],
            &["../proto"],
        )?;

    println!("cargo:rerun-if-changed=../proto/roofcrm/commission/v1/commission.proto");

    Ok(())
}
