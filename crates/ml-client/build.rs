fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the embedding service contract (client and server stubs)
    tonic_build::compile_protos("../../proto/movie.proto")?;
    Ok(())
}
