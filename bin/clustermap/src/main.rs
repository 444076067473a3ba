use clustermap::run;

fn main() {
    let result = run();

    // Default error handling prints the error in detailed format.
    if let Err(error) = result {
        eprintln!("clustermap process failed: {:?}", error);
        std::process::exit(1);
    }
}
