//! Publication orchestrator
//!
//! Runs the fixed publication sequence once per target:
//!
//! 1. register the style (idempotent)
//! 2. upload the SLD body
//! 3. publish the feature type (idempotent)
//! 4. bind the default style
//! 5. re-download the SLD and check its length
//! 6. probe the layer's HTTP status
//!
//! Steps 1-4 mutate map-server state and abort on the first failure. Steps
//! 5-6 only observe; their result lands in the outcome record.

use crate::core::error::PublishError;
use crate::core::traits::{
    GeometryLayer, MapServerAdmin, PublicationOutcome, PublicationResult, PublicationTarget,
    StyleDescriptor,
};
use std::sync::Arc;

/// Shortest SLD body accepted as intact after the round trip
pub const MIN_SLD_LENGTH: usize = 50;

/// Mirror publication request as supplied by the caller
///
/// Either field may be missing; the orchestrator rejects incomplete requests
/// before issuing any call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorRequest {
    pub workspace: Option<String>,
    pub datastore: Option<String>,
}

/// Targets of one publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPlan {
    pub primary: PublicationTarget,
    pub mirror: Option<MirrorRequest>,
}

impl PublishPlan {
    pub fn primary_only(primary: PublicationTarget) -> Self {
        Self {
            primary,
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: MirrorRequest) -> Self {
        self.mirror = Some(mirror);
        self
    }
}

/// Drives a [`MapServerAdmin`] through the publication sequence
pub struct PublicationOrchestrator {
    admin: Arc<dyn MapServerAdmin>,
}

impl PublicationOrchestrator {
    pub fn new(admin: Arc<dyn MapServerAdmin>) -> Self {
        Self { admin }
    }

    /// Publish `layer` to the plan's primary target and, if requested, its mirror
    ///
    /// The style is derived once and reused for both targets. A mirror
    /// request with a missing workspace or datastore fails with
    /// `PublishError::Configuration` before any call is made. A failure in
    /// the primary's mutating steps means the mirror is never attempted.
    pub async fn publish(
        &self,
        layer: &GeometryLayer,
        sld_body: Option<String>,
        plan: &PublishPlan,
    ) -> Result<PublicationResult, PublishError> {
        let mirror = plan
            .mirror
            .as_ref()
            .map(|m| PublicationTarget::mirror(m.workspace.as_deref(), m.datastore.as_deref()))
            .transpose()?;

        let style = StyleDescriptor::for_layer(&layer.name, sld_body);

        let primary = self.publish_target(layer, &style, &plan.primary).await?;

        let mirror = match mirror {
            Some(target) => Some(self.publish_target(layer, &style, &target).await?),
            None => None,
        };

        Ok(PublicationResult { primary, mirror })
    }

    /// Run the six-step sequence against a single target
    pub async fn publish_target(
        &self,
        layer: &GeometryLayer,
        style: &StyleDescriptor,
        target: &PublicationTarget,
    ) -> Result<PublicationOutcome, PublishError> {
        let workspace = target.workspace.as_str();
        let layer_name = layer.name.as_str();

        tracing::info!(
            workspace,
            layer = layer_name,
            style = %style.style_name,
            "registering style"
        );
        self.admin
            .ensure_style_registered(&style.style_name, workspace, &style.style_filename)
            .await?;

        tracing::info!(
            workspace,
            style = %style.style_name,
            bytes = style.sld_body.len(),
            "uploading style body"
        );
        self.admin
            .upload_style_body(&style.style_name, workspace, &style.sld_body)
            .await?;

        tracing::info!(
            workspace,
            datastore = %target.datastore,
            layer = layer_name,
            "publishing feature type"
        );
        self.admin
            .ensure_feature_type_published(workspace, &target.datastore, layer_name)
            .await?;

        tracing::info!(
            workspace,
            layer = layer_name,
            style = %style.style_name,
            "binding default style"
        );
        self.admin
            .bind_default_style(layer_name, workspace, &style.style_name)
            .await?;

        let sld_length = self
            .admin
            .fetch_style_body_length(workspace, &style.style_name)
            .await;
        let sld_validated = sld_length.is_some_and(|len| len >= MIN_SLD_LENGTH);
        if !sld_validated {
            tracing::warn!(
                workspace,
                style = %style.style_name,
                ?sld_length,
                "style body failed validation"
            );
        }

        let layer_http_status = self.admin.probe_layer_status(layer_name, workspace).await;

        tracing::info!(
            layer_ref = %target.layer_ref(layer_name),
            sld_validated,
            ?layer_http_status,
            "publication finished"
        );

        Ok(PublicationOutcome {
            layer_ref: target.layer_ref(layer_name),
            style_name: style.style_name.clone(),
            style_filename: style.style_filename.clone(),
            sld_validated,
            sld_length,
            layer_http_status,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geoserver::CallOutcome;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// In-memory admin API that records every call
    #[derive(Default)]
    pub(crate) struct MockAdmin {
        pub calls: Mutex<Vec<String>>,
        pub style_length: Option<Option<usize>>,
        pub layer_status: Option<u16>,
        pub fail_step: Option<&'static str>,
        pub feature_type_status: Option<StatusCode>,
        pub unreachable_probes: bool,
    }

    impl MockAdmin {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, step: &'static str, detail: String) -> Result<(), PublishError> {
            self.calls.lock().unwrap().push(format!("{} {}", step, detail));
            if self.fail_step == Some(step) {
                return Err(PublishError::Upstream {
                    status_code: 500,
                    method: "POST".to_string(),
                    url: format!("http://gs/rest/{}", step),
                    body_preview: "internal error".to_string(),
                    message: format!("{} failed", step),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MapServerAdmin for MockAdmin {
        async fn ensure_style_registered(
            &self,
            name: &str,
            workspace: &str,
            filename: &str,
        ) -> Result<(), PublishError> {
            self.record("register_style", format!("{}/{}/{}", workspace, name, filename))
        }

        async fn upload_style_body(
            &self,
            name: &str,
            workspace: &str,
            sld_body: &str,
        ) -> Result<(), PublishError> {
            self.record("upload_style", format!("{}/{}/{}", workspace, name, sld_body.len()))
        }

        async fn ensure_feature_type_published(
            &self,
            workspace: &str,
            datastore: &str,
            layer: &str,
        ) -> Result<(), PublishError> {
            self.record("publish_feature_type", format!("{}/{}/{}", workspace, datastore, layer))?;
            match self.feature_type_status {
                Some(status) => CallOutcome::for_create(status, "").into_result(
                    "POST",
                    "http://gs/rest/featuretypes",
                    "feature type rejected",
                ),
                None => Ok(()),
            }
        }

        async fn bind_default_style(
            &self,
            layer: &str,
            workspace: &str,
            style_name: &str,
        ) -> Result<(), PublishError> {
            self.record("bind_style", format!("{}/{}/{}", workspace, layer, style_name))
        }

        async fn fetch_style_body_length(&self, workspace: &str, name: &str) -> Option<usize> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("fetch_style {}/{}", workspace, name));
            if self.unreachable_probes {
                return None;
            }
            self.style_length.unwrap_or(Some(1200))
        }

        async fn probe_layer_status(&self, layer: &str, workspace: &str) -> Option<u16> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("probe_layer {}/{}", workspace, layer));
            if self.unreachable_probes {
                return None;
            }
            Some(self.layer_status.unwrap_or(200))
        }
    }

    fn rio_grande() -> GeometryLayer {
        GeometryLayer::new("rio_grande", "/tmp/upload/rio grande.shp", 4674)
    }

    fn primary() -> PublicationTarget {
        PublicationTarget::new("zcm", "zcm_ds")
    }

    fn orchestrator(admin: &Arc<MockAdmin>) -> PublicationOrchestrator {
        PublicationOrchestrator::new(admin.clone())
    }

    #[tokio::test]
    async fn test_primary_sequence_runs_in_order() {
        let admin = Arc::new(MockAdmin::default());

        let result = orchestrator(&admin)
            .publish(&rio_grande(), None, &PublishPlan::primary_only(primary()))
            .await
            .unwrap();

        let steps: Vec<String> = admin
            .calls()
            .iter()
            .map(|c| c.split(' ').next().unwrap().to_string())
            .collect();
        assert_eq!(
            steps,
            vec![
                "register_style",
                "upload_style",
                "publish_feature_type",
                "bind_style",
                "fetch_style",
                "probe_layer"
            ]
        );

        assert_eq!(result.primary.layer_ref, "zcm:rio_grande");
        assert_eq!(result.primary.style_name, "rio_grande_style");
        assert_eq!(result.primary.style_filename, "rio_grande.sld");
        assert!(result.primary.sld_validated);
        assert_eq!(result.primary.layer_http_status, Some(200));
        assert!(result.mirror.is_none());
    }

    #[tokio::test]
    async fn test_fallback_style_is_uploaded_when_none_supplied() {
        let admin = Arc::new(MockAdmin::default());

        orchestrator(&admin)
            .publish(&rio_grande(), None, &PublishPlan::primary_only(primary()))
            .await
            .unwrap();

        let expected_len = StyleDescriptor::for_layer("rio_grande", None).sld_body.len();
        assert!(
            admin
                .calls()
                .contains(&format!("upload_style zcm/rio_grande_style/{}", expected_len))
        );
    }

    #[tokio::test]
    async fn test_missing_style_body_marks_unvalidated_without_error() {
        let admin = Arc::new(MockAdmin {
            style_length: Some(None),
            layer_status: Some(404),
            ..Default::default()
        });

        let result = orchestrator(&admin)
            .publish(&rio_grande(), None, &PublishPlan::primary_only(primary()))
            .await
            .unwrap();

        assert!(!result.primary.sld_validated);
        assert_eq!(result.primary.sld_length, None);
        assert_eq!(result.primary.layer_http_status, Some(404));
    }

    #[tokio::test]
    async fn test_short_style_body_fails_validation() {
        let admin = Arc::new(MockAdmin {
            style_length: Some(Some(MIN_SLD_LENGTH - 1)),
            ..Default::default()
        });

        let result = orchestrator(&admin)
            .publish(&rio_grande(), None, &PublishPlan::primary_only(primary()))
            .await
            .unwrap();

        assert!(!result.primary.sld_validated);
        assert_eq!(result.primary.sld_length, Some(MIN_SLD_LENGTH - 1));
    }

    #[tokio::test]
    async fn test_style_body_at_threshold_is_valid() {
        let admin = Arc::new(MockAdmin {
            style_length: Some(Some(MIN_SLD_LENGTH)),
            ..Default::default()
        });

        let result = orchestrator(&admin)
            .publish(&rio_grande(), None, &PublishPlan::primary_only(primary()))
            .await
            .unwrap();

        assert!(result.primary.sld_validated);
    }

    #[tokio::test]
    async fn test_unreachable_probes_still_produce_outcome() {
        let admin = Arc::new(MockAdmin {
            unreachable_probes: true,
            ..Default::default()
        });

        let result = orchestrator(&admin)
            .publish(&rio_grande(), None, &PublishPlan::primary_only(primary()))
            .await
            .unwrap();

        assert!(!result.primary.sld_validated);
        assert_eq!(result.primary.layer_http_status, None);
    }

    #[tokio::test]
    async fn test_feature_type_conflict_is_treated_as_success() {
        let admin = Arc::new(MockAdmin {
            feature_type_status: Some(StatusCode::CONFLICT),
            ..Default::default()
        });

        let result = orchestrator(&admin)
            .publish(&rio_grande(), None, &PublishPlan::primary_only(primary()))
            .await
            .unwrap();

        assert_eq!(result.primary.layer_ref, "zcm:rio_grande");
        assert_eq!(admin.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_feature_type_rejection_aborts_sequence() {
        let admin = Arc::new(MockAdmin {
            feature_type_status: Some(StatusCode::BAD_REQUEST),
            ..Default::default()
        });

        let result = orchestrator(&admin)
            .publish(&rio_grande(), None, &PublishPlan::primary_only(primary()))
            .await;

        assert!(matches!(
            result,
            Err(PublishError::Upstream {
                status_code: 400,
                ..
            })
        ));
        assert_eq!(admin.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mirror_with_empty_datastore_fails_before_any_call() {
        let admin = Arc::new(MockAdmin::default());
        let plan = PublishPlan::primary_only(primary()).with_mirror(MirrorRequest {
            workspace: Some("inde".to_string()),
            datastore: Some(String::new()),
        });

        let result = orchestrator(&admin).publish(&rio_grande(), None, &plan).await;

        assert!(matches!(result, Err(PublishError::Configuration { .. })));
        assert!(admin.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mirror_publishes_same_style_to_both_targets() {
        let admin = Arc::new(MockAdmin::default());
        let plan = PublishPlan::primary_only(primary()).with_mirror(MirrorRequest {
            workspace: Some("inde".to_string()),
            datastore: Some("inde_ds".to_string()),
        });

        let sld = "<sld>custom body long enough to pass the length check</sld>".to_string();
        let result = orchestrator(&admin)
            .publish(&rio_grande(), Some(sld), &plan)
            .await
            .unwrap();

        let mirror = result.mirror.expect("mirror outcome");
        assert_eq!(result.primary.layer_ref, "zcm:rio_grande");
        assert_eq!(mirror.layer_ref, "inde:rio_grande");
        assert_eq!(mirror.style_name, result.primary.style_name);
        assert_eq!(mirror.style_filename, result.primary.style_filename);

        let calls = admin.calls();
        assert_eq!(calls.len(), 12);
        assert!(calls.contains(&"publish_feature_type inde/inde_ds/rio_grande".to_string()));
        assert!(calls.contains(&"probe_layer inde/rio_grande".to_string()));

        let uploads: Vec<&String> = calls
            .iter()
            .filter(|c| c.starts_with("upload_style"))
            .collect();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].rsplit('/').next(), uploads[1].rsplit('/').next());
    }

    #[tokio::test]
    async fn test_primary_failure_skips_mirror() {
        let admin = Arc::new(MockAdmin {
            fail_step: Some("bind_style"),
            ..Default::default()
        });
        let plan = PublishPlan::primary_only(primary()).with_mirror(MirrorRequest {
            workspace: Some("inde".to_string()),
            datastore: Some("inde_ds".to_string()),
        });

        let result = orchestrator(&admin).publish(&rio_grande(), None, &plan).await;

        assert!(matches!(result, Err(PublishError::Upstream { .. })));
        assert!(admin.calls().iter().all(|c| !c.contains("inde")));
        assert!(admin.calls().iter().all(|c| !c.starts_with("fetch_style")));
    }
}
