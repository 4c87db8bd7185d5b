fn main() {
    tafel_pipeline::cli::run();
}
