// Conditionals, loops, break/continue and dead-code suppression.

use crate::common::assert_main_ir;

#[test]
fn if_without_else() {
    assert_main_ir(
        r#"
        if 1 {
            return 0
        }
        if 0 {
            return 1
        }
        "#,
        r#"
        jnz 1, @b1, @b2
    @b1
        ret 0
    @b2
    @b3

        jnz 0, @b4, @b5
    @b4
        ret 1
    @b5
    @b6
        "#,
    );
}

#[test]
fn if_else_suppresses_jumps_after_ret() {
    assert_main_ir(
        r#"
        if 1 {
            return 0
        } else {
            return 1
        }
        if 0 {
            return 2
        } else {
            return 3
        }
        "#,
        r#"
        jnz 1, @b1, @b2
    @b1
        ret 0
    @b2
        ret 1
    @b3

        jnz 0, @b4, @b5
    @b4
        ret 2
    @b5
        ret 3
    @b6
        "#,
    );
}

#[test]
fn else_if_chains_nest_their_end_blocks() {
    assert_main_ir(
        r#"
        if 1 {
            return 0
        } else if 2 {
            return 1
        } else if 3 {
            return 2
        } else {
            return 3
        }
        "#,
        r#"
        jnz 1, @b1, @b2
    @b1
        ret 0
    @b2
        jnz 2, @b4, @b5
    @b4
        ret 1
    @b5
        jnz 3, @b7, @b8
    @b7
        ret 2
    @b8
        ret 3
    @b9
    @b6
    @b3
        "#,
    );
}

#[test]
fn bare_loops_fall_through_the_header() {
    assert_main_ir(
        r#"
        var a I32
        for {a = 0}
        for ;; {a = 1}
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1

    @b1
    @b2
        storew 0, %t1
        jmp @b1
    @b3

    @b4
    @b5
        storew 1, %t1
        jmp @b4
    @b6
        "#,
    );
}

#[test]
fn conditional_loops_test_in_the_header() {
    assert_main_ir(
        r#"
        var a I32
        for 1 {a = 0}
        for ; 2; {a = 1}
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1

    @b1
        jnz 1, @b2, @b3
    @b2
        storew 0, %t1
        jmp @b1
    @b3

    @b4
        jnz 2, @b5, @b6
    @b5
        storew 1, %t1
        jmp @b4
    @b6
        "#,
    );
}

#[test]
fn loop_init_runs_once_before_the_header() {
    assert_main_ir(
        r#"
        var a I32
        for a = 0; 1; {a = 0}
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1

        storew 0, %t1
    @b1
        jnz 1, @b2, @b3
    @b2
        storew 0, %t1
        jmp @b1
    @b3
        "#,
    );
}

#[test]
fn loop_post_runs_in_its_own_block() {
    assert_main_ir(
        r#"
        var a I32
        for a = 0; 1; a = 1 {a = 0}
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1

        storew 0, %t1
    @b1
        jnz 1, @b2, @b3
    @b2
        storew 0, %t1
    @b4
        storew 1, %t1
        jmp @b1
    @b3
        "#,
    );
}

#[test]
fn break_and_continue_target_the_innermost_loop() {
    assert_main_ir(
        r#"
        var a I32
        for {
            a = 0
            break
            a = 1
        }
        for {
            a = 2
            continue
            a = 3
        }
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1

    @b1
    @b2
        storew 0, %t1
        jmp @b3
    @b4
        storew 1, %t1
        jmp @b1
    @b3

    @b5
    @b6
        storew 2, %t1
        jmp @b5
    @b8
        storew 3, %t1
        jmp @b5
    @b7
        "#,
    );
}

#[test]
fn continue_reaches_the_post_block() {
    assert_main_ir(
        r#"
        var a I32
        for a = 0; 1; a = 2 {
            a = 1
            continue
        }
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1

        storew 0, %t1
    @b1
        jnz 1, @b2, @b3
    @b2
        storew 1, %t1
        jmp @b4
    @b5
    @b4
        storew 2, %t1
        jmp @b1
    @b3
        "#,
    );
}

#[test]
fn nested_loops_pop_their_targets() {
    assert_main_ir(
        r#"
        var a I32
        for {
            for {
                break
            }
            break
        }
        "#,
        r#"
        %t1 =l alloc4 4
        storew 0, %t1

    @b1
    @b2
        @b4
        @b5
            jmp @b6
        @b7
            jmp @b4
        @b6
        jmp @b3
    @b8
        jmp @b1
    @b3
        "#,
    );
}
