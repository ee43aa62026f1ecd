//! Prints the Worker CRD as YAML.

use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&crds::Worker::crd())?);
    Ok(())
}
