//! Flat shading materials.
//!
//! Primitives reference materials by id; the model here is deliberately
//! small (constant shading values, no texture plumbing).

use serde_json::Value;

use crate::dict::{dict_object, Ref};
use crate::document::Document;
use crate::error::Result;
use crate::json::{find_object, float_array, member_f32, JsonMap};

/// Constant shading values for a primitive.
#[derive(Debug, Default)]
pub struct Material {
    pub id: String,
    pub name: Option<String>,
    pub ambient: Option<[f32; 4]>,
    pub diffuse: Option<[f32; 4]>,
    pub specular: Option<[f32; 4]>,
    pub emission: Option<[f32; 4]>,
    pub shininess: Option<f32>,
    pub transparency: Option<f32>,
}

impl Material {
    fn read_fields(&mut self, _this: Ref<Self>, obj: &JsonMap, _doc: &mut Document) -> Result<()> {
        if let Some(values) = find_object(obj, "values") {
            self.ambient = float_array::<4>(values, "ambient");
            self.diffuse = float_array::<4>(values, "diffuse");
            self.specular = float_array::<4>(values, "specular");
            self.emission = float_array::<4>(values, "emission");
            self.shininess = member_f32(values, "shininess");
            self.transparency = member_f32(values, "transparency");
        }
        Ok(())
    }

    fn write_fields(&self, _doc: &Document) -> JsonMap {
        let mut values = JsonMap::new();
        let mut color = |key: &str, c: &Option<[f32; 4]>| {
            if let Some(c) = c {
                values.insert(key.to_owned(), Value::from(c.to_vec()));
            }
        };
        color("ambient", &self.ambient);
        color("diffuse", &self.diffuse);
        color("specular", &self.specular);
        color("emission", &self.emission);
        if let Some(shininess) = self.shininess {
            values.insert("shininess".to_owned(), Value::from(shininess));
        }
        if let Some(transparency) = self.transparency {
            values.insert("transparency".to_owned(), Value::from(transparency));
        }

        let mut obj = JsonMap::new();
        obj.insert("values".to_owned(), Value::Object(values));
        obj
    }
}

dict_object!(Material, materials, "materials");
