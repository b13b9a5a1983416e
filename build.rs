// Stamps the CLI's long version with the build date.
fn main() {
    let date = chrono::Utc::now().format("%Y-%m-%d");

    println!("cargo:rustc-env=RECIPE_BUILD_DATE={date}");
    println!("cargo:rerun-if-changed=build.rs");
}
