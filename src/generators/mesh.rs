use crate::ast::Ast;
use crate::options::Options;
use crate::source::Source;
use crate::Result;

/// Run the mesh proxy as a native sidecar, so it starts before and stops
/// after the workload's own containers. Jobs depend on this to complete.
pub const NATIVE_SIDECAR_ANNOTATION: &str = "config.alpha.linkerd.io/proxy-enable-native-sidecar";

pub fn create(_source: &impl Source, ast: &mut Ast, options: &Options) -> Result<()> {
    if options.mesh_injected {
        ast.annotations
            .insert(NATIVE_SIDECAR_ANNOTATION.into(), "true".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn only_in_meshed_namespaces() {
        let app = testing::minimal_application();
        let mut options = testing::options();
        let mut ast = Ast::new();
        create(&app, &mut ast, &options).unwrap();
        assert!(ast.annotations.is_empty());

        options.mesh_injected = true;
        create(&app, &mut ast, &options).unwrap();
        assert_eq!(ast.annotations[NATIVE_SIDECAR_ANNOTATION], "true");
    }
}
