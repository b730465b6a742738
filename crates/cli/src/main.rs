fn main() {
    if let Err(error) = pdfcaliper_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
