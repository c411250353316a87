mod common;

#[test]
fn constructor_sets_fields_and_is_implicitly_returned() {
    common::assert_prints(
        "class Point { init(x, y) { this.x = x; this.y = y; } }\
         var p = Point(1, 2);\
         print p.x;\
         print p.y;",
        &["1", "2"],
    );
}

#[test]
fn method_reads_field_through_this() {
    common::assert_prints(
        "class Greeter {\
             init(name) { this.name = name; }\
             greet() { return \"hi \" + this.name; }\
         }\
         print Greeter(\"Ada\").greet();",
        &["hi Ada"],
    );
}

#[test]
fn subclass_inherits_method_not_overridden() {
    common::assert_prints(
        "class A { greet() { print \"hi\"; } }\
         class B < A {}\
         B().greet();",
        &["hi"],
    );
}

#[test]
fn super_calls_the_overridden_method() {
    common::assert_prints(
        "class Animal { init(name) { this.name = name; } speak() { return this.name + \" makes a sound\"; } }\
         class Dog < Animal { speak() { return super.speak() + \"!\"; } }\
         print Dog(\"Rex\").speak();",
        &["Rex makes a sound!"],
    );
}

#[test]
fn static_method_is_called_on_the_class_without_an_instance() {
    common::assert_prints(
        "class Math { class square(n) { return n * n; } }\
         print Math.square(4);",
        &["16"],
    );
}

#[test]
fn printing_a_class_shows_its_name_and_an_instance_shows_instance_suffix() {
    common::assert_prints(
        "class Foo {}\
         print Foo;\
         print Foo();",
        &["Foo", "Foo instance"],
    );
}

#[test]
fn assigning_an_undeclared_field_is_allowed_and_reads_back() {
    common::assert_prints(
        "class Bag {}\
         var b = Bag();\
         b.item = \"rock\";\
         print b.item;",
        &["rock"],
    );
}

#[test]
fn reading_an_undefined_property_is_a_runtime_error() {
    let run = common::run(
        "class Empty {}\
         print Empty().missing;",
    );
    assert!(run.had_runtime_error);
}
