//! Shared fixtures for unit tests: a small widget toolkit described the
//! way a real platform's introspection dump would describe it.

use crate::oracle::{
    ConstructionInfo, ControllerDescriptor, ControllerField, ControllerMethod, HandlerDescriptor,
    PropertyDescriptor, StaticOracle, StaticPropertyDescriptor, TypeDescriptor, ValueType,
};

pub fn widget_oracle() -> StaticOracle {
    let mut oracle = StaticOracle::new();

    oracle.add_type(TypeDescriptor {
        qualified_name: "demo.widgets.Pane".to_string(),
        simple_name: "Pane".to_string(),
        construction: ConstructionInfo::default(),
        default_property: Some("children".to_string()),
        properties: vec![
            PropertyDescriptor {
                name: "children".to_string(),
                value_type: ValueType::Sequence {
                    element: Box::new(ValueType::Object {
                        type_name: "demo.widgets.Node".to_string(),
                    }),
                },
                read_only: true,
            },
            PropertyDescriptor {
                name: "title".to_string(),
                value_type: ValueType::String,
                read_only: false,
            },
            PropertyDescriptor {
                name: "depth".to_string(),
                value_type: ValueType::Integer,
                read_only: true,
            },
        ],
        static_properties: vec![StaticPropertyDescriptor {
            property: "rowIndex".to_string(),
            value_type: ValueType::Integer,
        }],
        handlers: Vec::new(),
        constants: Vec::new(),
        enum_variants: Vec::new(),
    });

    oracle.add_type(TypeDescriptor {
        qualified_name: "demo.widgets.Label".to_string(),
        simple_name: "Label".to_string(),
        construction: ConstructionInfo::default(),
        default_property: Some("text".to_string()),
        properties: vec![
            PropertyDescriptor {
                name: "text".to_string(),
                value_type: ValueType::String,
                read_only: false,
            },
            PropertyDescriptor {
                name: "width".to_string(),
                value_type: ValueType::Float,
                read_only: false,
            },
            PropertyDescriptor {
                name: "visible".to_string(),
                value_type: ValueType::Boolean,
                read_only: false,
            },
            PropertyDescriptor {
                name: "labelFor".to_string(),
                value_type: ValueType::Object {
                    type_name: "demo.widgets.Node".to_string(),
                },
                read_only: false,
            },
        ],
        static_properties: Vec::new(),
        handlers: vec![HandlerDescriptor {
            name: "onAction".to_string(),
            event_type: "demo.events.ActionEvent".to_string(),
        }],
        constants: Vec::new(),
        enum_variants: Vec::new(),
    });

    oracle.add_type(TypeDescriptor {
        qualified_name: "demo.widgets.Orientation".to_string(),
        simple_name: "Orientation".to_string(),
        construction: ConstructionInfo {
            no_arg_constructor: false,
            ..ConstructionInfo::default()
        },
        default_property: None,
        properties: Vec::new(),
        static_properties: Vec::new(),
        handlers: Vec::new(),
        constants: Vec::new(),
        enum_variants: vec!["HORIZONTAL".to_string(), "VERTICAL".to_string()],
    });

    oracle.add_type(TypeDescriptor {
        qualified_name: "demo.widgets.Duration".to_string(),
        simple_name: "Duration".to_string(),
        construction: ConstructionInfo {
            no_arg_constructor: false,
            value_of: true,
            ..ConstructionInfo::default()
        },
        default_property: None,
        properties: Vec::new(),
        static_properties: Vec::new(),
        handlers: Vec::new(),
        constants: vec!["INDEFINITE".to_string()],
        enum_variants: Vec::new(),
    });

    oracle.add_controller(ControllerDescriptor {
        qualified_name: "demo.MainController".to_string(),
        fields: vec![ControllerField {
            name: "lbl".to_string(),
            type_name: "demo.widgets.Label".to_string(),
        }],
        methods: vec![ControllerMethod {
            name: "handleAction".to_string(),
            event_type: Some("demo.events.ActionEvent".to_string()),
        }],
        has_initialize: true,
        factory_method: None,
    });

    oracle
}
