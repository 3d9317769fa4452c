//! Layer naming and default style generation

use regex::Regex;
use std::sync::LazyLock;

/// Name used when sanitization leaves nothing behind
pub const FALLBACK_LAYER_NAME: &str = "layer";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]").unwrap());
static REPEATED_UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Normalise a file stem into a layer/table name matching `^[a-z0-9_]+$`
///
/// # Examples
///
/// ```
/// use shapefile_publisher::core::naming::sanitize_layer_name;
///
/// assert_eq!(sanitize_layer_name("Rio Grande"), "rio_grande");
/// assert_eq!(sanitize_layer_name("  ---  "), "layer");
/// ```
pub fn sanitize_layer_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let name = WHITESPACE.replace_all(&lowered, "_");
    let name = INVALID_CHARS.replace_all(&name, "_");
    let name = REPEATED_UNDERSCORES.replace_all(&name, "_");
    let name = name.trim_matches('_');

    if name.is_empty() {
        FALLBACK_LAYER_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Fallback SLD used when the upload carries no style of its own
pub fn build_basic_polygon_sld(layer_name: &str) -> String {
    format!(
        r##"<?xml version="1.0" encoding="UTF-8"?>
<sld:StyledLayerDescriptor xmlns="http://www.opengis.net/sld"
  xmlns:sld="http://www.opengis.net/sld"
  xmlns:ogc="http://www.opengis.net/ogc"
  xmlns:xlink="http://www.w3.org/1999/xlink"
  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  version="1.0.0">
  <sld:NamedLayer>
    <sld:Name>{layer}_style</sld:Name>
    <sld:UserStyle>
      <sld:Title>{layer} default style</sld:Title>
      <sld:FeatureTypeStyle>
        <sld:Rule>
          <sld:PolygonSymbolizer>
            <sld:Fill>
              <sld:CssParameter name="fill">#66ccff</sld:CssParameter>
              <sld:CssParameter name="fill-opacity">0.5</sld:CssParameter>
            </sld:Fill>
            <sld:Stroke>
              <sld:CssParameter name="stroke">#003366</sld:CssParameter>
              <sld:CssParameter name="stroke-width">1</sld:CssParameter>
            </sld:Stroke>
          </sld:PolygonSymbolizer>
        </sld:Rule>
      </sld:FeatureTypeStyle>
    </sld:UserStyle>
  </sld:NamedLayer>
</sld:StyledLayerDescriptor>"##,
        layer = layer_name
    )
}

/// Interpret a loosely typed boolean flag (`1`, `true`, `yes`, `on`)
pub fn parse_toggle(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
