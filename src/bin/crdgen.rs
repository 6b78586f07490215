use kube::CustomResourceExt;

use naiserator::resources::{application::Application, naisjob::Naisjob};

fn main() -> anyhow::Result<()> {
    for crd in [Application::crd(), Naisjob::crd()] {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
