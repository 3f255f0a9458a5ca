fn main() {
    let build_number = std::env::var("RUNDASH_BUILD_NUMBER")
        .ok()
        .or_else(|| std::fs::read_to_string("BUILD_NUMBER").ok())
        .unwrap_or_else(|| "0".to_string())
        .trim()
        .to_string();

    println!("cargo:rustc-env=BUILD_NUMBER={build_number}");
    println!("cargo:rerun-if-changed=BUILD_NUMBER");
    println!("cargo:rerun-if-env-changed=RUNDASH_BUILD_NUMBER");
}
