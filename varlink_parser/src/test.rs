use crate::*;

const SERVICE: &str = "\
# The Varlink Service Interface is provided by every varlink service. It
# describes the service and the interfaces it implements.
interface org.varlink.service

# Get a list of all the interfaces a service provides and information
# about the implementation.
method GetInfo() -> (
  vendor: string,
  product: string,
  version: string,
  url: string,
  interfaces: []string
)

# Get the description of an interface that is implemented by this service.
method GetInterfaceDescription(interface: string) -> (description: string)

# The requested interface was not found.
error InterfaceNotFound (interface: string)

# The requested method was not found
error MethodNotFound (method: string)

# The interface defines the requested method, but the service does not
# implement it.
error MethodNotImplemented (method: string)

# One of the passed parameters is invalid.
error InvalidParameter (parameter: string)
";

const FTL: &str = "\
# Interface to jump a spacecraft to another point in space.
interface org.example.ftl

# The current state of the FTL drive and the amount of
# fuel available to jump.
type DriveCondition (
  state: (idle, spooling, busy),
  tylium_level: int
)

type DriveConfiguration (
  speed: int,
  trajectory: int,
  duration: int
)

type Coordinate (
  longitude: float,
  latitude: float,
  distance: int
)

# Monitor the drive.
method Monitor() -> (condition: DriveCondition)

method CalculateConfiguration(
  current: Coordinate,
  target: Coordinate
) -> (configuration: DriveConfiguration)

method Jump(configuration: DriveConfiguration) -> ()

error NotEnoughEnergy ()

error ParameterOutOfRange (field: string)
";

fn string() -> Type {
    Type::new(TypeKind::String)
}

fn int() -> Type {
    Type::new(TypeKind::Int)
}

fn named(name: &str) -> Type {
    Type::new(TypeKind::Name(name.into()))
}

#[test]
fn test_standard() {
    let iface = Interface::from_string(SERVICE).unwrap();
    assert_eq!(iface.name, "org.varlink.service");
    assert!(iface.typedefs.is_empty());
    assert_eq!(
        iface.method_keys,
        vec!["GetInfo", "GetInterfaceDescription"]
    );
    assert_eq!(
        iface.error_keys,
        vec![
            "InterfaceNotFound",
            "MethodNotFound",
            "MethodNotImplemented",
            "InvalidParameter"
        ]
    );

    let get_info = &iface.methods["GetInfo"];
    assert!(get_info.input.is_empty());
    assert_eq!(
        get_info.output,
        vec![
            ("vendor", string()),
            ("product", string()),
            ("version", string()),
            ("url", string()),
            ("interfaces", Type::new(TypeKind::Array(Box::new(string())))),
        ]
        .into_iter()
        .collect::<Struct>()
    );

    assert_eq!(
        iface.errors["InvalidParameter"].parm.get("parameter"),
        Some(&string())
    );

    assert_eq!(
        iface.to_string(),
        "\
interface org.varlink.service

method GetInfo() -> (
  vendor: string,
  product: string,
  version: string,
  url: string,
  interfaces: []string
)

method GetInterfaceDescription(interface: string) -> (description: string)

error InterfaceNotFound (interface: string)

error MethodNotFound (method: string)

error MethodNotImplemented (method: string)

error InvalidParameter (parameter: string)
"
    );
}

#[test]
fn test_ftl() {
    let iface = Interface::from_string(FTL).unwrap();
    assert_eq!(iface.name, "org.example.ftl");
    assert_eq!(
        iface.typedef_keys,
        vec!["DriveCondition", "DriveConfiguration", "Coordinate"]
    );

    assert_eq!(
        iface.typedefs["DriveCondition"].ty,
        Type::new(TypeKind::Struct(
            vec![
                (
                    "state",
                    Type::new(TypeKind::Enum(
                        vec!["idle", "spooling", "busy"].into_iter().collect()
                    ))
                ),
                ("tylium_level", int()),
            ]
            .into_iter()
            .collect()
        ))
    );

    let calc = &iface.methods["CalculateConfiguration"];
    assert_eq!(calc.input.get("current"), Some(&named("Coordinate")));
    assert_eq!(calc.input.get("target"), Some(&named("Coordinate")));
    assert_eq!(
        calc.output.get("configuration"),
        Some(&named("DriveConfiguration"))
    );
    assert!(iface.methods["Jump"].output.is_empty());
    assert!(iface.errors["NotEnoughEnergy"].parm.is_empty());

    assert_eq!(
        iface.to_string(),
        "\
interface org.example.ftl

type DriveCondition (state: (idle, spooling, busy), tylium_level: int)

type DriveConfiguration (speed: int, trajectory: int, duration: int)

type Coordinate (longitude: float, latitude: float, distance: int)

method Monitor() -> (condition: DriveCondition)

method CalculateConfiguration(current: Coordinate, target: Coordinate) -> (
  configuration: DriveConfiguration
)

method Jump(configuration: DriveConfiguration) -> ()

error NotEnoughEnergy ()

error ParameterOutOfRange (field: string)
"
    );
}

#[test]
fn test_add() {
    let iface =
        Interface::from_string("interface org.x\nmethod Add(a: int, b: int) -> (sum: int)\n")
            .unwrap();
    assert_eq!(iface.name, "org.x");
    assert!(iface.typedefs.is_empty());
    assert!(iface.errors.is_empty());
    assert_eq!(iface.methods.len(), 1);

    let add = &iface.methods["Add"];
    assert_eq!(add.name, "Add");
    assert_eq!(
        add.input.fields,
        vec![
            Field {
                name: "a".into(),
                ty: int()
            },
            Field {
                name: "b".into(),
                ty: int()
            },
        ]
    );
    assert_eq!(
        add.output,
        vec![("sum", int())].into_iter().collect::<Struct>()
    );
}

#[test]
fn test_struct_or_enum() {
    let iface = Interface::from_string(
        "interface org.x\ntype State (idle, busy)\ntype S (state: string)\ntype E ()\n",
    )
    .unwrap();
    assert_eq!(
        iface.typedefs["State"].ty.kind,
        TypeKind::Enum(Enum {
            variants: vec!["idle".into(), "busy".into()]
        })
    );
    assert_eq!(
        iface.typedefs["S"].ty.kind,
        TypeKind::Struct(vec![("state", string())].into_iter().collect())
    );
    assert_eq!(iface.typedefs["E"].ty.kind, TypeKind::Struct(Struct::new()));
}

#[test]
fn test_single_variant_enum() {
    let iface = Interface::from_string("interface org.x\ntype One (only)\n").unwrap();
    assert_eq!(
        iface.typedefs["One"].ty.kind,
        TypeKind::Enum(vec!["only"].into_iter().collect())
    );
}

#[test]
fn test_nullable_array_map() {
    let iface = Interface::from_string(
        "interface org.x
type T (
  a: ?int,
  b: []?string,
  c: ?[]string,
  d: [string]T,
  e: [string](),
  f: ?(x: float, y: ?object),
  g: []bool
)
",
    )
    .unwrap();
    let t = match iface.typedefs["T"].ty.kind {
        TypeKind::Struct(ref s) => s.clone(),
        ref other => panic!("not a struct: {:?}", other),
    };
    assert_eq!(t.len(), 7);
    assert_eq!(t.get("a"), Some(&Type::nullable(TypeKind::Int)));
    assert_eq!(
        t.get("b"),
        Some(&Type::new(TypeKind::Array(Box::new(Type::nullable(
            TypeKind::String
        )))))
    );
    assert_eq!(
        t.get("c"),
        Some(&Type::nullable(TypeKind::Array(Box::new(string()))))
    );
    assert_eq!(
        t.get("d"),
        Some(&Type::new(TypeKind::Map(Box::new(named("T")))))
    );
    assert_eq!(
        t.get("e"),
        Some(&Type::new(TypeKind::Map(Box::new(Type::new(
            TypeKind::Struct(Struct::new())
        )))))
    );
    assert_eq!(
        t.get("f"),
        Some(&Type::nullable(TypeKind::Struct(
            vec![
                ("x", Type::new(TypeKind::Float)),
                ("y", Type::nullable(TypeKind::Object))
            ]
            .into_iter()
            .collect()
        )))
    );
    assert_eq!(
        t.get("g"),
        Some(&Type::new(TypeKind::Array(Box::new(Type::new(
            TypeKind::Bool
        )))))
    );
    assert_eq!(
        t.to_string(),
        "(a: ?int, b: []?string, c: ?[]string, d: [string]T, e: [string](), \
         f: ?(x: float, y: ?object), g: []bool)"
    );
}

#[test]
fn test_complex() {
    let iface = Interface::from_string(
        "interface org.example.complex
type TypeEnum ( a, b, c )

type TypeFoo (
bool: bool,
int: int,
float: float,
string: string,
enum: ( foo, bar, baz ),
type: TypeEnum,
anon: ( foo: bool, bar: int, baz: ( a: int, b: int) )
)

method Foo(a: (b: bool, c: int), foo: TypeFoo) -> (a: (b: bool, c: int), foo: TypeFoo)

error ErrorFoo (a: (b: bool, c: int), foo: TypeFoo)
",
    )
    .unwrap();
    assert_eq!(iface.name, "org.example.complex");
    assert_eq!(
        iface.to_string(),
        "\
interface org.example.complex

type TypeEnum (a, b, c)

type TypeFoo (
  bool: bool,
  int: int,
  float: float,
  string: string,
  enum: (foo, bar, baz),
  type: TypeEnum,
  anon: (foo: bool, bar: int, baz: (a: int, b: int))
)

method Foo(a: (b: bool, c: int), foo: TypeFoo) -> (
  a: (b: bool, c: int),
  foo: TypeFoo
)

error ErrorFoo (a: (b: bool, c: int), foo: TypeFoo)
"
    );
}

#[test]
fn test_format() {
    let iface = Interface::from_string("interface foo.bar\ntype I(b:[]bool)\nmethod  F()->()").unwrap();
    assert_eq!(
        iface.to_string(),
        "interface foo.bar\n\ntype I (b: []bool)\n\nmethod F() -> ()\n"
    );
    assert_eq!(
        iface.get_oneline(),
        "interface foo.bar\n\ntype I (b: []bool)\n\nmethod F() -> ()\n"
    );
}

#[test]
fn test_format_reparses_equal() {
    for src in &[SERVICE, FTL] {
        let iface = Interface::from_string(src).unwrap();

        let multiline = Interface::from_string(&iface.to_string()).unwrap();
        assert_eq!(multiline, iface);

        let narrow = Interface::from_string(&iface.get_multiline(0, 20)).unwrap();
        assert_eq!(narrow, iface);

        let oneline: Interface = iface.get_oneline().parse().unwrap();
        assert_eq!(oneline, iface);
    }
}

#[test]
fn test_format_wrapped_input_keeps_width() {
    // `) -> (...)` on the last line is exactly 81 columns with a 76 column output.
    let src = format!(
        "interface org.x\nmethod Wide({}: int) -> ({}: string)\n",
        "b".repeat(70),
        "a".repeat(65)
    );
    let iface = Interface::from_string(&src).unwrap();
    let text = iface.to_string();
    for line in text.lines() {
        assert!(line.len() <= 80, "{} columns: {}", line.len(), line);
    }
    assert!(text.contains(&format!("\n) -> (\n  {}: string\n)\n", "a".repeat(65))));
    assert_eq!(Interface::from_string(&text).unwrap(), iface);
}

#[test]
fn test_deterministic() {
    let a = Interface::from_string(FTL).unwrap();
    let b = Interface::from_string(FTL).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.to_string(), b.to_string());
}

#[test]
fn test_declaration_order() {
    let iface = Interface::from_string(
        "interface org.x\nmethod Zeta()->()\nmethod Alpha()->()\nmethod Mid()->()\n",
    )
    .unwrap();
    let names: Vec<&str> = iface.methods().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
}

#[test]
fn test_comments_and_whitespace() {
    let iface = Interface::from_string(
        "\t# header\r\ninterface org.x # trailing\r\n\r\n  method   F ( a :int )->( ) # done",
    )
    .unwrap();
    assert_eq!(iface.methods["F"].input.get("a"), Some(&int()));
}

#[test]
fn test_one_method_no_type() {
    assert!(Interface::from_string("interface foo.bar\nmethod Foo()->(b:)").is_err());
}

#[test]
fn test_domainnames() {
    let ok = |name: &str| Interface::from_string(&format!("interface {}\nmethod F()->()", name));
    assert!(ok("org.varlink.service").is_ok());
    assert!(ok("com.example.0example").is_ok());
    assert!(ok("com.example.example-dash").is_ok());
    assert!(ok("xn--lgbbat1ad8j.example.algeria").is_ok());
    assert!(ok("a.b").is_ok());
    assert!(ok("a1.b--1.c--1").is_ok());
    assert!(ok("a.21.c").is_ok());
    assert!(ok("a.0.0").is_ok());
    assert!(ok("com.-example.leadinghyphen").is_err());
    assert!(ok("com.example-.danglinghyphen-").is_err());
    assert!(ok("Com.example.uppercase-toplevel").is_err());
    assert!(ok("1om.example.number-toplevel").is_err());
    assert!(ok("com.Example").is_err());
    assert!(ok("ab").is_err());
    assert!(ok(".a.b.c").is_err());
    assert!(ok("a..b.c").is_err());
    assert!(ok("a.*.c").is_err());
}

#[test]
fn test_type_one_array() {
    let parse = |t: &str| {
        Interface::from_string(&format!("interface foo.bar\n type I (b:{})\nmethod F()->()", t))
    };
    assert!(parse("[]bool").is_ok());
    assert!(parse("bool[ ]").is_err());
    assert!(parse("[ ]bool").is_err());
    assert!(parse("[1]bool").is_err());
    assert!(parse("[int]bool").is_err());
}

#[test]
fn test_enum_then_struct_is_rejected() {
    let err = Interface::from_string("interface org.x\ntype T (a, b: int)\n").unwrap_err();
    match err {
        Error::Syntax {
            line,
            column,
            ref found,
            ..
        } => {
            assert_eq!((line, column), (2, 13));
            assert_eq!(found, "`:`");
        }
        ref other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_struct_then_enum_is_rejected() {
    let err = Interface::from_string("interface org.x\ntype T (a: int, b)\n").unwrap_err();
    match err {
        Error::Syntax { line, column, .. } => assert_eq!((line, column), (2, 18)),
        ref other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_method_with_enum_is_rejected() {
    assert!(Interface::from_string("interface org.x\nmethod F(a, b) -> ()\n").is_err());
    assert!(Interface::from_string("interface org.x\nerror E (a, b)\n").is_err());
}

#[test]
fn test_unknown_keyword() {
    let err = Interface::from_string("interface org.x\n\n  struct S ()\n").unwrap_err();
    assert_eq!(err.position(), (3, 3));
    assert_eq!(
        err.to_string(),
        "3:3: expected one of `type`, `method`, `error`, found `struct`"
    );
}

#[test]
fn test_missing_interface() {
    let err = Interface::from_string("method F() -> ()").unwrap_err();
    assert_eq!(err.position(), (1, 1));
    let err = Interface::from_string("").unwrap_err();
    assert_eq!(
        err,
        Error::Syntax {
            line: 1,
            column: 1,
            expected: "`interface`".into(),
            found: "end of input".into(),
        }
    );
}

#[test]
fn test_truncated() {
    let err = Interface::from_string("interface org.x\nmethod F(a: int").unwrap_err();
    match err {
        Error::Syntax { ref found, .. } => assert_eq!(found, "end of input"),
        ref other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_lowercase_type_name_is_rejected() {
    assert!(Interface::from_string("interface org.x\ntype foo ()\n").is_err());
    assert!(Interface::from_string("interface org.x\nmethod F(a: foo) -> ()\n").is_err());
}

#[test]
fn test_duplicate() {
    let err = Interface::from_string(
        "interface foo.example
type Device()
type Device()
method F() -> ()
",
    )
    .unwrap_err();
    assert_eq!(
        err,
        Error::Duplicate {
            line: 3,
            column: 6,
            kind: "type",
            name: "Device".into(),
        }
    );
    assert_eq!(err.to_string(), "3:6: multiple definitions of type `Device`");

    let err = Interface::from_string("interface foo.example\nmethod F()->()\nmethod F()->()")
        .unwrap_err();
    assert_eq!(err.position(), (3, 8));

    let err =
        Interface::from_string("interface foo.example\nerror E()\nerror E()").unwrap_err();
    assert!(matches!(err, Error::Duplicate { kind: "error", .. }));
}

#[test]
fn test_same_name_in_different_sections() {
    let iface =
        Interface::from_string("interface foo.example\ntype F ()\nmethod F()->()\nerror F ()")
            .unwrap();
    assert_eq!(iface.typedefs.len(), 1);
    assert_eq!(iface.methods.len(), 1);
    assert_eq!(iface.errors.len(), 1);
}
