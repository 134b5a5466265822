use kube::CustomResourceExt;
use siirto::crd::canary::Canary;

fn main() -> anyhow::Result<()> {
    // Generate the Canary CRD manifest.
    // Use: cargo run --bin gen-crd | python3 -c "import sys,json,yaml; print(yaml.dump(json.load(sys.stdin), default_flow_style=False))"
    // to convert to YAML

    let crd = Canary::crd();
    let json_output = serde_json::to_string_pretty(&crd)?;
    println!("{}", json_output);
    Ok(())
}
